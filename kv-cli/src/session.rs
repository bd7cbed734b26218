//! The client REPL/one-shot session: tokenizes a line with [`crate::ast`],
//! speaks [`kv::wire`] to a leader, and renders the result through
//! [`crate::show::Show`]. A `try_new` constructor plus `handle_repl`/
//! `handle_reader` drive a networked leader connection instead of an
//! in-process storage engine.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use kv::message::{MessageType, Request};
use kv::wire;
use rustyline::error::ReadlineError;
use rustyline::Editor;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::ast::token_kind::TokenKind;
use crate::ast::tokenizer::{tokenize_command, Token};
use crate::config::ConfigLoad;
use crate::rusty::CliHelper;
use crate::show::Show;
use crate::PBAR;

enum Parsed {
    Get(String),
    Put(String, String),
    Del(String),
    Exit,
    Empty,
}

/// Picks the text a keyword's argument token carries: quotes are stripped
/// from `QuotedString`, everything else is used verbatim.
fn token_text(tok: &Token) -> String {
    match tok.kind {
        TokenKind::QuotedString => {
            let s = tok.text();
            s[1..s.len() - 1].to_string()
        }
        _ => tok.text().to_string(),
    }
}

fn parse_line(line: &str) -> Result<Parsed> {
    let tokens = tokenize_command(line).map_err(|err| anyhow!(err))?;
    let mut args = tokens
        .iter()
        .filter(|t| !matches!(t.kind, TokenKind::Whitespace | TokenKind::Newline | TokenKind::EOI));

    let Some(head) = args.next() else {
        return Ok(Parsed::Empty);
    };

    match head.kind {
        TokenKind::GET => {
            let key = args.next().ok_or_else(|| anyhow!("GET requires a key"))?;
            Ok(Parsed::Get(token_text(key)))
        }
        TokenKind::PUT | TokenKind::SET => {
            let key = args.next().ok_or_else(|| anyhow!("PUT requires a key"))?;
            let val = args.next().ok_or_else(|| anyhow!("PUT requires a value"))?;
            Ok(Parsed::Put(token_text(key), token_text(val)))
        }
        TokenKind::DEL | TokenKind::DELETE => {
            let key = args.next().ok_or_else(|| anyhow!("DEL requires a key"))?;
            Ok(Parsed::Del(token_text(key)))
        }
        TokenKind::EXIT => Ok(Parsed::Exit),
        TokenKind::KEYS | TokenKind::INFO => {
            Err(anyhow!("not supported by this server: only GET/PUT/DEL are served"))
        }
        _ => Err(anyhow!("unrecognized command: {}", head.text())),
    }
}

pub struct Session {
    cfg: ConfigLoad,
    is_repl: bool,
    running: Arc<AtomicBool>,
}

impl Session {
    pub async fn try_new(cfg: ConfigLoad, is_repl: bool, running: Arc<AtomicBool>) -> Result<Self> {
        Ok(Session { cfg, is_repl, running })
    }

    async fn connect(&self) -> Result<TcpStream> {
        let (host, port) = self.cfg.leader_addr();
        Ok(TcpStream::connect((host.as_str(), port)).await?)
    }

    async fn run_one(&self, line: &str) -> Result<i64> {
        match parse_line(line)? {
            Parsed::Empty => Ok(0),
            Parsed::Exit => {
                self.running.store(false, Ordering::SeqCst);
                Ok(0)
            }
            Parsed::Get(key) => {
                let mut stream = self.connect().await?;
                wire::write_request(&mut stream, &Request::new(MessageType::GetReq, key, None))
                    .await?;
                let mut reader = BufReader::new(stream);
                let response = wire::read_response(&mut reader).await?;
                match response.kind {
                    MessageType::GetResp => {
                        println!("{}", self.render(&response.body));
                        Ok(1)
                    }
                    _ => {
                        PBAR.error(&response.body);
                        Ok(0)
                    }
                }
            }
            Parsed::Put(key, val) => {
                let mut stream = self.connect().await?;
                wire::write_request(
                    &mut stream,
                    &Request::new(MessageType::PutReq, key, Some(val)),
                )
                .await?;
                let mut reader = BufReader::new(stream);
                let response = wire::read_response(&mut reader).await?;
                match response.kind {
                    MessageType::Success => {
                        println!("OK ~");
                        Ok(1)
                    }
                    _ => {
                        PBAR.error(&response.body);
                        Ok(0)
                    }
                }
            }
            Parsed::Del(key) => {
                let mut stream = self.connect().await?;
                wire::write_request(&mut stream, &Request::new(MessageType::DelReq, key, None))
                    .await?;
                let mut reader = BufReader::new(stream);
                let response = wire::read_response(&mut reader).await?;
                match response.kind {
                    MessageType::Success => {
                        println!("OK ~");
                        Ok(1)
                    }
                    _ => {
                        PBAR.error(&response.body);
                        Ok(0)
                    }
                }
            }
        }
    }

    fn render(&self, val: &str) -> String {
        if self.cfg.replace_newline {
            val.replace('\n', " ")
        } else {
            val.to_string()
        }
    }

    pub async fn handle_repl(&mut self) {
        let mut rl = Editor::<CliHelper, rustyline::history::DefaultHistory>::new()
            .expect("failed to initialize line editor");
        rl.set_helper(Some(CliHelper::new()));

        while self.running.load(Ordering::SeqCst) {
            match rl.readline(&self.cfg.prompt) {
                Ok(line) => {
                    let _ = rl.add_history_entry(line.as_str());
                    if line.trim().is_empty() {
                        continue;
                    }
                    let show = Show::new(self.cfg.show_stats, self.is_repl);
                    match self.run_one(&line).await {
                        Ok(affected) => show.output(affected),
                        Err(err) => PBAR.error(&err.to_string()),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    PBAR.error(&err.to_string());
                    break;
                }
            }
        }
    }

    pub async fn handle_reader<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for line in reader.lines() {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let start = Instant::now();
            let show = Show::new_with_start(self.cfg.show_stats, self.is_repl, start);
            match self.run_one(&line).await {
                Ok(affected) => show.output(affected),
                Err(err) => PBAR.error(&err.to_string()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_get_put_del() {
        assert!(matches!(parse_line("GET foo").unwrap(), Parsed::Get(k) if k == "foo"));
        assert!(matches!(
            parse_line("PUT foo bar").unwrap(),
            Parsed::Put(k, v) if k == "foo" && v == "bar"
        ));
        assert!(matches!(parse_line("DEL foo").unwrap(), Parsed::Del(k) if k == "foo"));
    }

    #[test]
    fn put_accepts_quoted_value_with_spaces() {
        match parse_line(r#"PUT foo "hello world""#).unwrap() {
            Parsed::Put(k, v) => {
                assert_eq!(k, "foo");
                assert_eq!(v, "hello world");
            }
            _ => panic!("expected PUT"),
        }
    }

    #[test]
    fn empty_line_is_noop() {
        assert!(matches!(parse_line("   ").unwrap(), Parsed::Empty));
    }

    #[test]
    fn keys_and_info_are_rejected() {
        assert!(parse_line("KEYS").is_err());
        assert!(parse_line("INFO").is_err());
    }
}
