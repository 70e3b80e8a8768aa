//! Where passwords come from.
//!
//! Interactive use reads from the terminal with echo off; piped use reads one
//! line per secret from stdin; scripts and tests can hand over a fixed map.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::collections::HashMap;
use std::io::{self, BufRead, IsTerminal, Write};

/// Why a secret is being asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Choosing a new password for an account.
    Create,
    /// Proving an existing identity.
    Verify,
}

pub trait SecretSource {
    fn read_secret(&mut self, identity: &str, purpose: Purpose) -> io::Result<String>;
}

fn prompt_for(identity: &str, purpose: Purpose) -> String {
    match purpose {
        Purpose::Create => format!("Set password for {identity}: "),
        Purpose::Verify => format!("Password for {identity}: "),
    }
}

/// Prompts on stderr and reads from the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalSecrets;

impl SecretSource for TerminalSecrets {
    fn read_secret(&mut self, identity: &str, purpose: Purpose) -> io::Result<String> {
        let prompt = prompt_for(identity, purpose);
        if io::stdin().is_terminal() {
            read_hidden(&prompt)
        } else {
            read_piped_line()
        }
    }
}

fn read_hidden(prompt: &str) -> io::Result<String> {
    let mut err = io::stderr();
    write!(err, "{prompt}")?;
    err.flush()?;
    enable_raw_mode()?;
    let res = collect_keys();
    // Always attempt to restore the terminal
    disable_raw_mode()?;
    writeln!(err)?;
    res
}

fn collect_keys() -> io::Result<String> {
    let mut secret = String::new();
    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }
        match code {
            KeyCode::Enter => return Ok(secret),
            KeyCode::Backspace => {
                secret.pop();
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "password entry cancelled"));
            }
            KeyCode::Esc => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "password entry cancelled"));
            }
            KeyCode::Char(c) => secret.push(c),
            _ => {}
        }
    }
}

fn read_piped_line() -> io::Result<String> {
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no password on stdin"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Secrets known up front, keyed by identity.
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    secrets: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, identity: impl Into<String>, secret: impl Into<String>) -> Self {
        self.secrets.insert(identity.into(), secret.into());
        self
    }

    pub fn set(&mut self, identity: impl Into<String>, secret: impl Into<String>) {
        self.secrets.insert(identity.into(), secret.into());
    }
}

impl SecretSource for StaticSecrets {
    fn read_secret(&mut self, identity: &str, _purpose: Purpose) -> io::Result<String> {
        self.secrets.get(identity).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no password supplied for {identity}"))
        })
    }
}

impl<S: SecretSource + ?Sized> SecretSource for &mut S {
    fn read_secret(&mut self, identity: &str, purpose: Purpose) -> io::Result<String> {
        (**self).read_secret(identity, purpose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_secrets_answer_by_identity() {
        let mut s = StaticSecrets::new().with("admin", "root");
        s.set("bob", "pw");
        assert_eq!(s.read_secret("admin", Purpose::Verify).unwrap(), "root");
        assert_eq!(s.read_secret("bob", Purpose::Create).unwrap(), "pw");
        let err = s.read_secret("carol", Purpose::Verify).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn prompts_name_the_account() {
        assert_eq!(prompt_for("bob", Purpose::Verify), "Password for bob: ");
        assert_eq!(prompt_for("admin", Purpose::Create), "Set password for admin: ");
    }
}
