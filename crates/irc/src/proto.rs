//! Just enough of the IRC line format to register, join and talk.

/// Longest payload sent in one `PRIVMSG`, leaving room for the prefix the
/// server prepends when relaying.
pub const MAX_TEXT_BYTES: usize = 400;

/// A parsed inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl Line {
    /// Parse a raw line without its trailing CRLF. Message tags are skipped.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut rest = raw.trim_end_matches(['\r', '\n']);
        if let Some(tagged) = rest.strip_prefix('@') {
            rest = tagged.split_once(' ')?.1;
        }
        rest = rest.trim_start();

        let prefix = match rest.strip_prefix(':') {
            Some(prefixed) => {
                let (prefix, tail) = prefixed.split_once(' ')?;
                rest = tail.trim_start();
                Some(prefix.to_string())
            },
            None => None,
        };

        let (command, mut rest) = match rest.split_once(' ') {
            Some((command, tail)) => (command, tail),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((param, tail)) => {
                    params.push(param.to_string());
                    rest = tail;
                },
                None => {
                    params.push(rest.to_string());
                    break;
                },
            }
        }

        Some(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// The nickname part of the prefix (`nick!user@host`).
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split_once('!').map_or(prefix, |(nick, _)| nick))
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

/// Replace line breaks so text cannot smuggle extra commands.
pub fn sanitize(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// Split `text` into chunks of at most [`MAX_TEXT_BYTES`], on character
/// boundaries.
pub fn split_text(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > MAX_TEXT_BYTES {
        let mut cut = MAX_TEXT_BYTES;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let (head, tail) = rest.split_at(cut);
        chunks.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}

/// `PRIVMSG` lines carrying `text` to `target`.
pub fn privmsg(target: &str, text: &str) -> Vec<String> {
    let text = sanitize(text);
    split_text(&text)
        .into_iter()
        .map(|chunk| format!("PRIVMSG {target} :{chunk}"))
        .collect()
}

pub fn join(target: &str) -> String {
    format!("JOIN {target}")
}

pub fn quit(reason: &str) -> String {
    format!("QUIT :{reason}")
}

/// Case-folded form of a nickname or channel name for comparisons.
pub fn fold(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '[' => '{',
            ']' => '}',
            '\\' => '|',
            '~' => '^',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}
