use std::io::{Read, Write};

use pwmgen_line::{decode_response, LineReader, LineWriter, Response};
use tracing::debug;

use crate::error::{GeneratorError, Result};
use crate::message::{parse_greeting, GREETING, GREETING_PREFIX};

/// Perform the client side of the greeting.
///
/// Sends `PWM0` and expects `>HELO <identification>`. Returns the
/// identification with surrounding spaces removed.
///
/// Every failure here is fatal: a refused or malformed greeting leaves no
/// usable session.
pub fn greet<R: Read, W: Write>(
    reader: &mut LineReader<R>,
    writer: &mut LineWriter<W>,
) -> Result<String> {
    writer.send_request(GREETING)?;
    let record = reader.read_line()?;

    match decode_response(&record)? {
        Response::Data(payload) => {
            let id = parse_greeting(&payload).ok_or_else(|| {
                GeneratorError::InvalidGreeting(String::from_utf8_lossy(&payload).into_owned())
            })?;
            debug!(device = %id, "greeting accepted");
            Ok(id)
        }
        Response::DeviceError(message) => Err(GeneratorError::GreetingRefused(message)),
    }
}

/// Perform the device side of the greeting.
///
/// Reads one request, which must be exactly `PWM0`, and answers with
/// `HELO <identity>`. Any other request is answered with an error line and
/// reported as [`GeneratorError::InvalidGreeting`].
pub fn answer_greeting<R: Read, W: Write>(
    reader: &mut LineReader<R>,
    writer: &mut LineWriter<W>,
    identity: &str,
) -> Result<()> {
    let record = reader.read_line()?;
    let request = pwmgen_line::codec::strip_terminator(&record);
    if request != GREETING.as_bytes() {
        let found = String::from_utf8_lossy(request).into_owned();
        writer.send_response(&Response::DeviceError(format!(
            "expected \"{GREETING}\", got \"{found}\""
        )))?;
        return Err(GeneratorError::InvalidGreeting(found));
    }

    let reply = format!("{GREETING_PREFIX}{identity}");
    writer.send_response(&Response::Data(reply.into_bytes().into()))?;
    Ok(())
}
