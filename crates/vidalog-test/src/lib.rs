//! Fixtures for building synthetic diagnostic session logs in tests.

/// Get a temporary file with the given contents
pub fn tempfile<S: AsRef<str>>(contents: S) -> eyre::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new()?;
    std::io::Write::write_all(&mut file, contents.as_ref().as_bytes())?;
    Ok(file)
}

/// Format one session log line: timestamp, three metadata fields, message.
///
/// `timestamp` is the raw `HH:MM:SS,mmm` field, passed through unformatted so
/// tests can also produce malformed ones.
pub fn log_line(timestamp: &str, message: &str) -> String {
    format!("{timestamp} [pool-1-thread-1][DEBUG][vehcomm] {message}\n")
}

/// A line announcing the start of the ECU identification phase
pub fn ecu_id_start_line(timestamp: &str) -> String {
    log_line(timestamp, "> PerformEcuIdentification <")
}

/// A line announcing the end of the ECU identification phase
pub fn ecu_id_end_line(timestamp: &str) -> String {
    log_line(timestamp, "> PerformCarConfigReadout <")
}

/// A line reporting one identified ECU
pub fn ecu_id_line(timestamp: &str, identifier: &str) -> String {
    log_line(
        timestamp,
        &format!("SP: general_GetEcuId, EcuId: {identifier}, Result: OK"),
    )
}

/// A parameter-read request line naming the source ECU address
pub fn request_line(timestamp: &str, ecu_addr: &str) -> String {
    log_line(timestamp, &format!("VehComm request: Ecu '{ecu_addr}'"))
}

/// A parameter-read response line carrying the raw bus message
pub fn response_line(timestamp: &str, message: &str) -> String {
    log_line(timestamp, &format!("VehComm response: '{message}'"))
}
