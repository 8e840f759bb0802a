/// Gateway response code signalling a successful charge.
pub const RESPONSE_CODE_SUCCESS: &str = "00";

/// Fixed mapping from the gateway's two-digit response codes to
/// human-readable failure reasons, recorded on failed ledger rows.
pub fn describe_response_code(code: &str) -> &'static str {
    match code {
        "00" => "transaction successful",
        "07" => "transaction suspected of fraud",
        "09" => "card not registered for online payment",
        "10" => "card information entered incorrectly more than 3 times",
        "11" => "card payment window expired",
        "12" => "card or account is locked",
        "13" => "wrong one-time password",
        "24" => "transaction cancelled by customer",
        "51" => "insufficient funds",
        "65" => "daily transaction limit exceeded",
        "75" => "issuing bank under maintenance",
        "79" => "wrong payment password entered too many times",
        _ => "unspecified gateway error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_code_is_distinct_from_failures() {
        assert_eq!(describe_response_code("00"), "transaction successful");
        assert_eq!(describe_response_code("51"), "insufficient funds");
        assert_eq!(describe_response_code("42"), "unspecified gateway error");
    }
}
