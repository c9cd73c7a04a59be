use crate::line::HalfDuplexLine;
use crate::prelude::*;
use crate::samil::message::{templates, Message};
use crate::samil::protocol;

use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "commands: auth broadcast login logout unknown1 unknown2 getpvdata \
                    getfwversion getconfinfo mini zero ascii long quit";

/// Interactive protocol tester: reads commands from stdin and routes the
/// matching exchange to the inverter, printing the payload of whatever comes
/// back. Shares the codec and handshake with the logger loop; only the
/// behavior on top differs.
pub struct Tester {
    config: ConfigWrapper,
    channels: Channels,
    line: Box<dyn HalfDuplexLine>,
}

impl Tester {
    pub fn new(config: ConfigWrapper, channels: Channels, line: Box<dyn HalfDuplexLine>) -> Self {
        Self {
            config,
            channels,
            line,
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        let mut shutdown = self.channels.shutdown.subscribe();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("samil tester ready; {}", HELP);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                line = lines.next_line() => {
                    let Some(input) = line? else { break };
                    let command = input.trim().to_lowercase();
                    if command == "quit" {
                        break;
                    }
                    if let Some(output) = self.run_command(&command).await {
                        println!("{}", output);
                    }
                }
            }
        }

        Ok(())
    }

    async fn run_command(&mut self, command: &str) -> Option<String> {
        let pacing = self.config.timing().handshake_step();
        match command {
            "auth" => {
                let logged_in = protocol::login_inverter(self.line.as_mut(), false, pacing).await;
                Some(format!(
                    "auth: {}",
                    if logged_in { "logged in" } else { "failed" }
                ))
            }
            "broadcast" => {
                self.exec(
                    "bcast",
                    &templates::BROADCAST_REQUEST,
                    &templates::BROADCAST_RESPONSE,
                )
                .await
            }
            "login" => {
                self.exec(
                    "login",
                    &templates::LOGIN_MESSAGE,
                    &templates::LOGIN_RESPONSE,
                )
                .await
            }
            "logout" => {
                let result = self
                    .line
                    .send(&templates::LOGOUT_MESSAGE.to_bytes(), "logout")
                    .await;
                Some(match result {
                    Ok(()) => "logout sent".to_string(),
                    Err(err) => format!("ERR: {}", err),
                })
            }
            "unknown1" => {
                self.exec(
                    "unknown message 1",
                    &templates::UNKNOWN_MESSAGE_1,
                    &templates::UNKNOWN_RESPONSE_1,
                )
                .await
            }
            "unknown2" => {
                self.exec(
                    "unknown message 2",
                    &templates::UNKNOWN_MESSAGE_2,
                    &templates::UNKNOWN_RESPONSE_2,
                )
                .await
            }
            "getpvdata" => {
                self.exec(
                    "pv",
                    &templates::GET_PV_DATA_MESSAGE,
                    &templates::GET_PV_DATA_RESPONSE,
                )
                .await
            }
            "getfwversion" => {
                self.exec(
                    "get firmware response",
                    &templates::GET_FW_VERSION_MESSAGE,
                    &templates::GET_FW_VERSION_RESPONSE,
                )
                .await
            }
            "getconfinfo" => {
                self.exec(
                    "get configuration",
                    &templates::GET_CONF_INFO_MESSAGE,
                    &templates::GET_CONF_INFO_RESPONSE,
                )
                .await
            }
            // Raw line probes, for poking at the framing itself.
            "mini" => self.probe("mini", &[0x01, 0xaa]).await,
            "zero" => self.probe("zero", &[0x00]).await,
            "ascii" => self.probe("ascii", &[0x02, 0x40, 0x41]).await,
            "long" => {
                self.probe("long", b"0123456789abcdefghijklmnopqrstuwxyz$")
                    .await
            }
            "" => None,
            "help" => Some(HELP.to_string()),
            _ => Some("unknown command".to_string()),
        }
    }

    async fn exec(&mut self, op: &str, request: &Message, expected: &Message) -> Option<String> {
        match protocol::check_protocol(self.line.as_mut(), op, request, expected, false, false)
            .await
        {
            Some(response) => Some(format!("OK: {}", Utils::hex_string(&response.payload))),
            None => Some(format!("ERR: no valid {} response", op)),
        }
    }

    async fn probe(&mut self, op: &str, bytes: &[u8]) -> Option<String> {
        match self.line.send_receive(bytes, op).await {
            Ok(response) => Some(Utils::hex_string(&response)),
            Err(err) => Some(format!("ERR: {}", err)),
        }
    }
}
