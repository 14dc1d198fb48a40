use std::io::Cursor;
use std::time::Duration;

use nimble_frame::{check_frame, decode_slice, FrameError, FrameReader, FRAME_LEN};
use tracing::info;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_state, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;
    if args.exact {
        return decode_exact(&bytes, format);
    }

    let mut reader = FrameReader::new(Cursor::new(bytes));

    // An in-memory stream never blocks; the reader stops at end of input.
    let mut found = 0usize;
    loop {
        match reader.read_frame(Duration::from_secs(1)) {
            Ok(state) => {
                print_state(&state, format);
                found += 1;
            }
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => return Err(frame_error("decode failed", err)),
        }
    }

    let stats = reader.stats();
    info!(
        frames = stats.frames,
        discarded = stats.bytes_discarded,
        "decode finished"
    );

    if found == 0 {
        return Err(CliError::new(DATA_INVALID, "no valid frame in input"));
    }
    Ok(SUCCESS)
}

fn decode_exact(bytes: &[u8], format: OutputFormat) -> CliResult<i32> {
    match decode_slice(bytes) {
        Some(state) => {
            print_state(&state, format);
            Ok(SUCCESS)
        }
        None => Err(CliError::new(DATA_INVALID, rejection_reason(bytes))),
    }
}

fn rejection_reason(bytes: &[u8]) -> String {
    match <&[u8; FRAME_LEN]>::try_from(bytes) {
        Ok(frame) => match check_frame(frame) {
            Err(rejection) => format!("not a frame: {rejection}"),
            Ok(_) => "not a frame".to_string(),
        },
        Err(_) => format!("expected {FRAME_LEN} bytes, got {}", bytes.len()),
    }
}

/// Accepts whitespace-separated or packed hex, with optional `0x` prefixes.
fn parse_hex(args: &[String]) -> CliResult<Vec<u8>> {
    let mut bytes = Vec::new();
    for token in args.iter().flat_map(|arg| arg.split_whitespace()) {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        if digits.is_empty()
            || digits.len() % 2 != 0
            || !digits.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(CliError::new(USAGE, format!("invalid hex: {token}")));
        }
        for i in (0..digits.len()).step_by(2) {
            let byte = u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex: {token}")))?;
            bytes.push(byte);
        }
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_spaced_and_packed_hex() {
        let spaced = parse_hex(&args(&["81 2c 01", "0xff", "03B001"])).unwrap();
        assert_eq!(spaced, vec![0x81, 0x2C, 0x01, 0xFF, 0x03, 0xB0, 0x01]);
    }

    #[test]
    fn rejection_reason_names_the_failed_check() {
        let mut frame = vec![0x81, 0x2C, 0x01, 0xFF, 0x03, 0xB0, 0x01];
        assert_eq!(rejection_reason(&frame[..6]), "expected 7 bytes, got 6");

        frame[6] = 0x00;
        assert_eq!(rejection_reason(&frame), "not a frame: checksum mismatch");
    }

    #[test]
    fn rejects_odd_length_and_non_hex() {
        assert_eq!(parse_hex(&args(&["812"])).unwrap_err().code, USAGE);
        assert_eq!(parse_hex(&args(&["zz"])).unwrap_err().code, USAGE);
        assert_eq!(parse_hex(&args(&["0x"])).unwrap_err().code, USAGE);
        assert_eq!(parse_hex(&args(&["+1"])).unwrap_err().code, USAGE);
    }
}
