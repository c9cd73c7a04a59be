use crate::line::HalfDuplexLine;
use crate::prelude::*;
use crate::samil::message::{templates, Message};

use std::time::Duration;

const LOGOUT_REPEATS: usize = 3;

/// One request/response exchange with full validation.
///
/// A transport error, an undecodable frame or a response whose routing
/// fields differ from `expected` all fail the exchange (logged unless
/// `quiet`; bad frames are logged with their raw bytes). With
/// `payload_warn`, a payload that differs from the template is logged as a
/// warning but the exchange still succeeds - payload content is data, not
/// shape.
pub async fn check_protocol(
    line: &mut dyn HalfDuplexLine,
    op: &str,
    request: &Message,
    expected: &Message,
    payload_warn: bool,
    quiet: bool,
) -> Option<Message> {
    let bytes = match line.send_receive(&request.to_bytes(), op).await {
        Ok(bytes) => bytes,
        Err(err) => {
            if !quiet {
                warn!("unexpected {}: {}", op, err);
            }
            return None;
        }
    };

    let response = match Message::from_bytes(&bytes) {
        Ok(response) => response,
        Err(err) => {
            if !quiet {
                warn!("unexpected {}: {} (rcv {})", op, err, Utils::hex_string(&bytes));
            }
            return None;
        }
    };

    if !response.check_structure(expected) {
        if !quiet {
            warn!("unexpected {}: wrong message shape: {:?}", op, response);
        }
        return None;
    }

    if payload_warn && !response.check_payload(expected) {
        warn!(
            "strange payload in {}: {}",
            op,
            Utils::hex_string(&response.payload)
        );
    }

    Some(response)
}

/// Clears any stale session on the inverter side. Sent blind: the inverter
/// never answers a logout, and errors are ignored.
pub async fn logout_inverter(line: &mut dyn HalfDuplexLine, pacing: Duration) {
    for _ in 0..LOGOUT_REPEATS {
        let _ = line.send(&templates::LOGOUT_MESSAGE.to_bytes(), "logout").await;
        step_delay(pacing).await;
    }
}

/// Runs the login sequence, strictly in order, each step gated on the
/// exchange succeeding and the response matching the expected shape:
/// logout flush, broadcast discovery, login at the allocated address, two
/// opaque capability exchanges, firmware version query, configuration
/// query. Any failure aborts the remaining steps; the caller simply retries
/// on its next connection-check tick.
///
/// In night mode the inverter is expected to be unreachable, so broadcast
/// failures are not logged as faults.
pub async fn login_inverter(
    line: &mut dyn HalfDuplexLine,
    night_mode: bool,
    pacing: Duration,
) -> bool {
    logout_inverter(line, pacing).await;

    let response = match check_protocol(
        line,
        "bcast",
        &templates::BROADCAST_REQUEST,
        &templates::BROADCAST_RESPONSE,
        false,
        night_mode,
    )
    .await
    {
        Some(response) => response,
        None => return false,
    };

    let id = response.payload;
    if id.is_empty() {
        if !night_mode {
            warn!("unexpected bcast: empty device id");
        }
        return false;
    }
    info!("found inverter, id {}", String::from_utf8_lossy(&id));

    // Log in at the allocated address: device id with the address appended.
    let mut login_payload = id;
    login_payload.push(templates::ALLOCATED_ADDRESS as u8);
    let login = templates::LOGIN_MESSAGE.with_payload(login_payload);

    step_delay(pacing).await;
    if check_protocol(line, "login response", &login, &templates::LOGIN_RESPONSE, true, false)
        .await
        .is_none()
    {
        return false;
    }

    step_delay(pacing).await;
    if check_protocol(
        line,
        "unknown message 1",
        &templates::UNKNOWN_MESSAGE_1,
        &templates::UNKNOWN_RESPONSE_1,
        true,
        false,
    )
    .await
    .is_none()
    {
        return false;
    }

    step_delay(pacing).await;
    if check_protocol(
        line,
        "unknown message 2",
        &templates::UNKNOWN_MESSAGE_2,
        &templates::UNKNOWN_RESPONSE_2,
        true,
        false,
    )
    .await
    .is_none()
    {
        return false;
    }

    step_delay(pacing).await;
    if check_protocol(
        line,
        "get firmware response",
        &templates::GET_FW_VERSION_MESSAGE,
        &templates::GET_FW_VERSION_RESPONSE,
        false,
        false,
    )
    .await
    .is_none()
    {
        return false;
    }

    step_delay(pacing).await;
    if check_protocol(
        line,
        "get configuration",
        &templates::GET_CONF_INFO_MESSAGE,
        &templates::GET_CONF_INFO_RESPONSE,
        true,
        false,
    )
    .await
    .is_none()
    {
        return false;
    }

    true
}

async fn step_delay(pacing: Duration) {
    if !pacing.is_zero() {
        tokio::time::sleep(pacing).await;
    }
}
