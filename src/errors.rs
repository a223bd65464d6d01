// Error types for paddock

use snafu::Snafu;
use std::io;

#[derive(Debug, Snafu)]
pub enum PaddockError {
    // Errors for the remote resource client. These never leave the client:
    // they are logged and the request resolves to `None`.
    #[snafu(display("Could not build HTTP client"))]
    HttpClientBuild { source: reqwest::Error },
    #[snafu(display("Request to {endpoint} failed"))]
    HttpTransport {
        endpoint: String,
        source: reqwest::Error,
    },
    #[snafu(display("Request to {endpoint} returned HTTP {status}"))]
    HttpStatus { endpoint: String, status: u16 },
    #[snafu(display("Could not decode response from {endpoint}"))]
    ResponseDecode {
        endpoint: String,
        source: serde_json::Error,
    },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },

    // Comparison builder errors
    #[snafu(display("A comparison holds at most {max} columns"))]
    ColumnLimitReached { max: usize },
    #[snafu(display("Unknown comparison column: {column_id}"))]
    UnknownColumn { column_id: String },

    // User input validation errors
    #[snafu(display("Invalid user input: {field} - {reason}"))]
    InvalidUserInput { field: String, reason: String },

    // Lap export errors
    #[snafu(display("Error writing lap export file"))]
    ExportWriteError { source: io::Error },
    #[snafu(display("Error loading lap export file"))]
    ExportLoadError { source: io::Error },

    #[snafu(display("Could not start async runtime"))]
    RuntimeError { source: io::Error },
}
