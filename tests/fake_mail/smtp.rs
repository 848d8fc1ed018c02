//! Fake SMTP submission server
//!
//! Plain TCP, no TLS. Accepts any credentials and appends every message
//! it receives to the shared mailbox's `INBOX`, which is what a real
//! provider does when you mail yourself.

use super::io::write_str;
use super::mailbox::{Mailbox, SharedMailbox};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const EHLO_REPLY: &str = "250-fake.smtp\r\n250-AUTH PLAIN LOGIN\r\n250 8BITMIME\r\n";

/// An SMTP server on `127.0.0.1` with an OS-assigned port. Stops when
/// dropped.
pub struct FakeSmtpServer {
    port: u16,
    handle: JoinHandle<()>,
}

impl FakeSmtpServer {
    pub async fn start(mailbox: SharedMailbox) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let mailbox = Arc::clone(&mailbox);
                tokio::spawn(async move {
                    session(stream, &mailbox).await;
                });
            }
        });

        Self { port, handle }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for FakeSmtpServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Where the session is in the AUTH LOGIN exchange.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Auth {
    Idle,
    Username,
    Password,
}

async fn session<S: AsyncRead + AsyncWrite + Unpin>(stream: S, mailbox: &Mutex<Mailbox>) {
    let mut reader = BufReader::new(stream);
    if write_str(&mut reader, "220 fake.smtp ESMTP ready\r\n")
        .await
        .is_err()
    {
        return;
    }

    let mut auth = Auth::Idle;
    let mut plain_pending = false;

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim_end_matches(['\r', '\n']);

        // Continuation lines of an AUTH exchange carry only base64.
        if plain_pending {
            plain_pending = false;
            if write_str(&mut reader, "235 2.7.0 Authenticated\r\n").await.is_err() {
                break;
            }
            continue;
        }
        match auth {
            Auth::Username => {
                auth = Auth::Password;
                if write_str(&mut reader, "334 UGFzc3dvcmQ6\r\n").await.is_err() {
                    break;
                }
                continue;
            }
            Auth::Password => {
                auth = Auth::Idle;
                if write_str(&mut reader, "235 2.7.0 Authenticated\r\n").await.is_err() {
                    break;
                }
                continue;
            }
            Auth::Idle => {}
        }

        let verb = line
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        let reply = match verb.as_str() {
            "EHLO" | "HELO" => EHLO_REPLY.to_string(),
            "AUTH" => {
                let mut words = line.split_whitespace().skip(1);
                let mechanism = words.next().unwrap_or_default().to_ascii_uppercase();
                let initial = words.next();
                match (mechanism.as_str(), initial) {
                    ("PLAIN", Some(_)) => "235 2.7.0 Authenticated\r\n".to_string(),
                    ("PLAIN", None) => {
                        plain_pending = true;
                        "334 \r\n".to_string()
                    }
                    ("LOGIN", Some(_)) => {
                        auth = Auth::Password;
                        "334 UGFzc3dvcmQ6\r\n".to_string()
                    }
                    ("LOGIN", None) => {
                        auth = Auth::Username;
                        "334 VXNlcm5hbWU6\r\n".to_string()
                    }
                    _ => "504 5.5.4 Unrecognized authentication type\r\n".to_string(),
                }
            }
            "MAIL" | "RCPT" | "RSET" | "NOOP" => "250 2.0.0 OK\r\n".to_string(),
            "DATA" => {
                if write_str(&mut reader, "354 End data with <CR><LF>.<CR><LF>\r\n")
                    .await
                    .is_err()
                {
                    break;
                }
                let Some(raw) = read_data(&mut reader).await else {
                    break;
                };
                let uid = mailbox.lock().unwrap().append("INBOX", raw);
                format!("250 2.0.0 Queued as {uid}\r\n")
            }
            "QUIT" => {
                let _ = write_str(&mut reader, "221 2.0.0 Bye\r\n").await;
                break;
            }
            _ => "502 5.5.1 Command not implemented\r\n".to_string(),
        };

        if write_str(&mut reader, &reply).await.is_err() {
            break;
        }
    }
}

/// Read a DATA payload up to the lone `.` line, undoing dot-stuffing.
/// Returns `None` if the connection drops first.
async fn read_data<S: AsyncRead + AsyncWrite + Unpin>(reader: &mut BufReader<S>) -> Option<Vec<u8>> {
    let mut raw = Vec::new();
    loop {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line).await.ok()? == 0 {
            return None;
        }
        if line == b".\r\n" || line == b".\n" {
            return Some(raw);
        }
        let content = if line.starts_with(b"..") {
            &line[1..]
        } else {
            &line[..]
        };
        raw.extend_from_slice(content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    async fn exchange(script: &str) -> (String, Mailbox) {
        let mailbox = Mutex::new(Mailbox::with_folders(&["INBOX"]));
        let (mut client, server) = duplex(64 * 1024);

        client.write_all(script.as_bytes()).await.unwrap();
        client.shutdown().await.unwrap();
        session(server, &mailbox).await;

        let mut transcript = String::new();
        client.read_to_string(&mut transcript).await.unwrap();
        (transcript, mailbox.into_inner().unwrap())
    }

    #[tokio::test]
    async fn data_is_unstuffed_and_delivered() {
        let (transcript, mailbox) = exchange(
            "EHLO client\r\n\
             AUTH PLAIN AGRpZ2VzdABzZWNyZXQ=\r\n\
             MAIL FROM:<digest@example.com>\r\n\
             RCPT TO:<digest@example.com>\r\n\
             DATA\r\n\
             Subject: hello\r\n\
             \r\n\
             ..leading dot\r\n\
             .\r\n\
             QUIT\r\n",
        )
        .await;

        assert!(transcript.starts_with("220 "));
        assert!(transcript.contains("250-AUTH PLAIN LOGIN"));
        assert!(transcript.contains("235 "));
        assert!(transcript.contains("250 2.0.0 Queued as 1"));
        assert!(transcript.ends_with("221 2.0.0 Bye\r\n"));

        let stored = &mailbox.folder("INBOX").unwrap().messages[0];
        assert_eq!(stored.raw, b"Subject: hello\r\n\r\n.leading dot\r\n");
        assert_eq!(stored.subject().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn auth_login_prompts_twice() {
        let (transcript, _) = exchange("EHLO c\r\nAUTH LOGIN\r\ndXNlcg==\r\ncGFzcw==\r\nQUIT\r\n").await;
        assert!(transcript.contains("334 VXNlcm5hbWU6\r\n334 UGFzc3dvcmQ6\r\n235 "));
    }

    #[tokio::test]
    async fn eof_inside_data_delivers_nothing() {
        let (_, mailbox) = exchange("EHLO c\r\nDATA\r\nSubject: cut off\r\n").await;
        assert!(mailbox.folder("INBOX").unwrap().messages.is_empty());
    }
}
