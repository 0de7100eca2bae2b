//! The status codes this client understands. Any other code on the control
//! channel is rejected by the response parser.

// 1xx: Positive Preliminary Reply
pub const ABOUT_TO_SEND: u32 = 150;

// 2xx: Positive Completion Reply
pub const COMMAND_OK: u32 = 200;
pub const CLOSING: u32 = 221;
pub const CLOSING_DATA_CONNECTION: u32 = 226;
pub const LOGGED_IN: u32 = 230;
pub const REQUESTED_FILE_ACTION_OK: u32 = 250;

// 3xx: Positive intermediate Reply
pub const NEED_PASSWORD: u32 = 331;

// 4xx: Transient Negative Completion Reply
pub const NOT_AVAILABLE: u32 = 421;
pub const CANNOT_OPEN_DATA_CONNECTION: u32 = 425;
pub const TRANSFER_ABORTED: u32 = 426;
pub const REQUEST_FILE_ACTION_IGNORED: u32 = 450;
pub const ACTION_ABORTED: u32 = 451;

// 5xx: Permanent Negative Completion Reply
pub const BAD_ARGUMENTS: u32 = 501;

/// Every code in the taxonomy, ascending.
pub const KNOWN: [u32; 13] = [
    ABOUT_TO_SEND,
    COMMAND_OK,
    CLOSING,
    CLOSING_DATA_CONNECTION,
    LOGGED_IN,
    REQUESTED_FILE_ACTION_OK,
    NEED_PASSWORD,
    NOT_AVAILABLE,
    CANNOT_OPEN_DATA_CONNECTION,
    TRANSFER_ABORTED,
    REQUEST_FILE_ACTION_IGNORED,
    ACTION_ABORTED,
    BAD_ARGUMENTS,
];

/// Returns true if `code` is one of the recognised status codes.
pub fn is_known(code: u32) -> bool {
    KNOWN.binary_search(&code).is_ok()
}
