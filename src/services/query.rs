//! Line-based lookup on stdin.
//!
//! Each line is `name [size]`, answered with the resolved path or
//! `not found`. Lines starting with `:` are commands:
//!
//! - `:add <dir>` - add an icon root
//! - `:register <path>` - publish an icon file, prints its name
//! - `:themes` - list installed themes
//! - `:order` - print the theme search order

use capy_icons::IconEngine;
use log::{debug, warn};
use std::io::{self, BufRead, Write};
use std::path::Path;

#[derive(Debug, PartialEq, Eq)]
enum Request<'a> {
    Resolve { name: &'a str, size: Option<u32> },
    AddDir(&'a str),
    Register(&'a str),
    Themes,
    Order,
}

fn parse_request(line: &str) -> Result<Request<'_>, String> {
    let line = line.trim();
    if let Some(command) = line.strip_prefix(':') {
        let (verb, arg) = match command.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (command, ""),
        };
        return match (verb, arg.is_empty()) {
            ("add", false) => Ok(Request::AddDir(arg)),
            ("register", false) => Ok(Request::Register(arg)),
            ("themes", true) => Ok(Request::Themes),
            ("order", true) => Ok(Request::Order),
            _ => Err(format!("unknown command :{}", command)),
        };
    }

    let mut parts = line.split_whitespace();
    let name = parts.next().ok_or_else(|| "empty request".to_string())?;
    let size = match parts.next() {
        Some(s) => Some(s.parse::<u32>().map_err(|_| format!("invalid size {:?}", s))?),
        None => None,
    };
    if parts.next().is_some() {
        return Err("expected `name [size]`".to_string());
    }
    Ok(Request::Resolve { name, size })
}

fn answer(engine: &IconEngine, request: Request<'_>, default_size: u32) -> Vec<String> {
    match request {
        Request::Resolve { name, size } => {
            let size = size.unwrap_or(default_size);
            match engine.resolve(name, size) {
                Some(icon) => vec![icon.path.display().to_string()],
                None => vec!["not found".to_string()],
            }
        }
        Request::AddDir(dir) => {
            let added = engine.add_base_dir(dir);
            vec![if added { "added" } else { "already known" }.to_string()]
        }
        Request::Register(path) => match engine.register_file_path(Path::new(path)) {
            Ok(name) => vec![name],
            Err(e) => vec![format!("error: {}", e)],
        },
        Request::Themes => engine
            .list_themes()
            .into_iter()
            .map(|t| format!("{}\t{}", t.id, t.title))
            .collect(),
        Request::Order => engine.search_order(),
    }
}

/// Serve requests from stdin until it closes.
pub fn run(engine: &IconEngine, default_size: u32) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_request(&line) {
            Ok(request) => {
                debug!("Query: {:?}", request);
                for out in answer(engine, request, default_size) {
                    writeln!(stdout, "{}", out)?;
                }
            }
            Err(e) => {
                warn!("Bad query {:?}: {}", line, e);
                writeln!(stdout, "error: {}", e)?;
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lookups() {
        assert_eq!(
            parse_request("firefox 48"),
            Ok(Request::Resolve {
                name: "firefox",
                size: Some(48)
            })
        );
        assert_eq!(
            parse_request("  edit-copy  "),
            Ok(Request::Resolve {
                name: "edit-copy",
                size: None
            })
        );
        assert!(parse_request("firefox big").is_err());
        assert!(parse_request("a 1 2").is_err());
    }

    #[test]
    fn parses_commands() {
        assert_eq!(
            parse_request(":add /opt/icons"),
            Ok(Request::AddDir("/opt/icons"))
        );
        assert_eq!(
            parse_request(":register /tmp/a b.png"),
            Ok(Request::Register("/tmp/a b.png"))
        );
        assert_eq!(parse_request(":themes"), Ok(Request::Themes));
        assert_eq!(parse_request(":order"), Ok(Request::Order));
        assert!(parse_request(":add").is_err());
        assert!(parse_request(":reload").is_err());
    }
}
