use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildArgs {
    values: BTreeMap<String, String>,
}

impl BuildArgs {
    pub fn new() -> Self {
        Self::default()
    }

    // Without a default the earlier value is kept.
    pub fn declare(&mut self, name: &str, default: Option<&str>) {
        if let Some(default) = default {
            let resolved = self.substitute(default);
            self.values.insert(name.to_string(), resolved);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    // Unknown names and malformed references are left verbatim.
    pub fn substitute(&self, input: &str) -> String {
        let bytes = input.as_bytes();
        let mut pos = 0;
        let mut out = String::with_capacity(input.len());

        while pos < bytes.len() {
            let Some(offset) = input[pos..].find('$') else {
                out.push_str(&input[pos..]);
                break;
            };
            out.push_str(&input[pos..pos + offset]);
            pos += offset;

            if bytes.get(pos + 1) == Some(&b'{') {
                let Some(close) = input[pos + 2..].find('}') else {
                    out.push_str(&input[pos..]);
                    break;
                };
                let cursor = pos + 2 + close;
                let body = &input[pos + 2..cursor];
                match self.expand_braced(body) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&input[pos..=cursor]),
                }
                pos = cursor + 1;
                continue;
            }

            let name_start = pos + 1;
            if !bytes.get(name_start).copied().is_some_and(is_var_start) {
                out.push('$');
                pos += 1;
                continue;
            }

            let mut cursor = name_start + 1;
            while cursor < bytes.len() && is_var_continue(bytes[cursor]) {
                cursor += 1;
            }
            match self.get(&input[name_start..cursor]) {
                Some(value) => out.push_str(value),
                None => out.push_str(&input[pos..cursor]),
            }
            pos = cursor;
        }

        out
    }

    fn expand_braced(&self, body: &str) -> Option<String> {
        if let Some((name, word)) = body.split_once(":-") {
            if !is_valid_var_name(name) {
                return None;
            }
            return match self.get(name) {
                Some(value) if !value.is_empty() => Some(value.to_string()),
                _ => Some(self.substitute(word)),
            };
        }

        if let Some((name, word)) = body.split_once(":+") {
            if !is_valid_var_name(name) {
                return None;
            }
            return match self.get(name) {
                Some(value) if !value.is_empty() => Some(self.substitute(word)),
                _ => Some(String::new()),
            };
        }

        if !is_valid_var_name(body) {
            return None;
        }
        self.get(body).map(str::to_string)
    }
}

fn is_var_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_var_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

fn is_valid_var_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    let Some(first) = bytes.next() else {
        return false;
    };
    if !is_var_start(first) {
        return false;
    }
    bytes.all(is_var_continue)
}
