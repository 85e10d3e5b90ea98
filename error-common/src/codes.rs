// Error codes implementation
// This module contains standardized error codes for the NeuroIntake engine

pub mod validation {
    pub const INVALID_INPUT: &str = "VALIDATION_1001";
    pub const MISSING_REQUIRED_FIELD: &str = "VALIDATION_1002";
    pub const INVALID_ENUM_VALUE: &str = "VALIDATION_1003";
}

pub mod forms {
    pub const ALREADY_COMPLETED: &str = "FORM_2001";
    pub const DUPLICATE_EMAIL: &str = "FORM_2002";
}

pub mod configuration {
    pub const INVALID_SETTING: &str = "CONFIG_3001";
}

pub mod database {
    pub const CONNECTION_FAILED: &str = "DB_4001";
    pub const QUERY_FAILED: &str = "DB_4002";
    pub const NOT_FOUND: &str = "DB_4003";
}

pub mod encryption {
    pub const ENCODE_FAILED: &str = "ENCRYPT_5001";
    pub const DECRYPT_FAILED: &str = "DECRYPT_5002";
    pub const LOOKUP_NOT_SUPPORTED: &str = "ENCRYPT_5003";
}

pub mod runtime {
    pub const TIMEOUT: &str = "RUNTIME_6001";
}
