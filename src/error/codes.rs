/// Error code registry for hearth
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors (composition and binding problems)
/// - 3000-3999: Storage errors
/// - 4000-4999: Execution errors (environment problems found before a script runs)
/// - 5000-5999: Script errors
/// - 9000-9999: Other errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_FILE_SET: u16 = 1001;
    pub const CONFIG_TAG_KIND: u16 = 1002;
    pub const CONFIG_TAG_CONFLICT: u16 = 1003;
    pub const CONFIG_UNKNOWN_RENAME: u16 = 1004;
    pub const CONFIG_DUPLICATE_PRODUCER: u16 = 1005;
    pub const CONFIG_INVALID_EXPOSED: u16 = 1006;
    pub const CONFIG_CONSUMED_BEFORE_PRODUCED: u16 = 1007;
    pub const CONFIG_EMPTY_COMPOSITION: u16 = 1008;
    pub const CONFIG_BACKEND_MODE: u16 = 1009;
    pub const CONFIG_INVALID_VALUE: u16 = 1010;
    pub const CONFIG_DUPLICATE_TAG: u16 = 1011;
    pub const CONFIG_UNKNOWN_UNIT: u16 = 1012;
    pub const CONFIG_INVALID_TOML: u16 = 1013;
    pub const CONFIG_INVALID_JSON: u16 = 1014;

    // Storage errors (3000-3999)
    pub const STORAGE_GENERIC: u16 = 3000;
    pub const STORAGE_IO_ERROR: u16 = 3001;
    pub const STORAGE_PERMISSION_DENIED: u16 = 3002;
    pub const STORAGE_NOT_FOUND: u16 = 3004;
    pub const STORAGE_ALREADY_EXISTS: u16 = 3005;
    pub const STORAGE_READ_ONLY: u16 = 3006;
    pub const STORAGE_INVALID_DATA_LITERAL: u16 = 3007;
    pub const STORAGE_ACCESS_DENIED: u16 = 3008;

    // Execution errors (4000-4999)
    pub const EXEC_GENERIC: u16 = 4000;
    pub const EXEC_MISSING_INPUT: u16 = 4001;
    pub const EXEC_OUTPUT_EXISTS: u16 = 4002;
    pub const EXEC_CIRCULAR_FILE_SET: u16 = 4003;
    pub const EXEC_RUN_OVERLAP: u16 = 4004;
    pub const EXEC_WORKER_FAILED: u16 = 4005;
    pub const EXEC_WORKER_PROTOCOL: u16 = 4006;
    pub const EXEC_SPAWN_FAILED: u16 = 4007;
    pub const EXEC_COMMAND_NOT_FOUND: u16 = 4008;

    // Script errors (5000-5999)
    pub const SCRIPT_GENERIC: u16 = 5000;
    pub const SCRIPT_FAILED: u16 = 5001;
    pub const SCRIPT_PANICKED: u16 = 5002;
    pub const SCRIPT_UNKNOWN_TAG: u16 = 5003;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
    pub const OTHER_INTERNAL_ERROR: u16 = 9004;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        1000 => "Generic configuration error",
        1001 => "Path bindings do not match the declared tag set",
        1002 => "Binding shape does not match the tag kind (single vs set)",
        1003 => "Two units declare the same output tag",
        1004 => "Rename map refers to a tag the base unit does not declare",
        1005 => "Two sequence steps produce the same tag",
        1006 => "Exposed intermediate is never produced in the sequence",
        1007 => "Sequence step produces a tag an earlier step already consumed",
        1008 => "Composition needs at least one unit",
        1009 => "Concurrency mode is incompatible with the intermediate backend",
        1010 => "Invalid configuration value",
        1011 => "Tag declared more than once in a contract",
        1012 => "Unit is not registered",
        1013 => "Invalid TOML syntax",
        1014 => "Invalid JSON syntax",

        3000 => "Generic storage error",
        3001 => "I/O operation failed",
        3002 => "Permission denied",
        3004 => "File or directory not found",
        3005 => "File already exists",
        3006 => "Store is read-only",
        3007 => "Data literal is not valid base64",
        3008 => "File reference opened in the wrong direction",

        4000 => "Generic execution error",
        4001 => "Input file does not exist",
        4002 => "Output file already exists and overwrite is not enabled",
        4003 => "Path bound as both input and output",
        4004 => "Paths already in use by another run in this context",
        4005 => "Worker process failed",
        4006 => "Worker process produced an unreadable response",
        4007 => "Failed to spawn worker process",
        4008 => "Worker command not found",

        5000 => "Generic script error",
        5001 => "Transform script returned an error",
        5002 => "Transform script panicked",
        5003 => "Script asked for a tag the transform does not declare",

        9000 => "Generic error",
        9004 => "Internal error",

        _ => "Unknown error code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_fall_in_category_ranges() {
        assert!((1000..2000).contains(&ErrorCode::CONFIG_TAG_CONFLICT));
        assert!((3000..4000).contains(&ErrorCode::STORAGE_READ_ONLY));
        assert!((4000..5000).contains(&ErrorCode::EXEC_CIRCULAR_FILE_SET));
        assert!((5000..6000).contains(&ErrorCode::SCRIPT_PANICKED));
    }

    #[test]
    fn test_describe_unknown_code() {
        assert_eq!(describe_error_code(1234), "Unknown error code");
        assert_eq!(
            describe_error_code(ErrorCode::EXEC_MISSING_INPUT),
            "Input file does not exist"
        );
    }
}
