use dockerfile_parser::{Dockerfile, Instruction as ParsedInstruction};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionKind {
    From {
        image: String,
        alias: Option<String>,
    },
    Arg(Vec<ArgDeclaration>),
    Copy,
    Run,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgDeclaration {
    pub name: String,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub kind: InstructionKind,
    // continuations joined
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl Instruction {
    pub fn keyword(&self) -> &str {
        match &self.kind {
            InstructionKind::From { .. } => "FROM",
            InstructionKind::Arg(_) => "ARG",
            InstructionKind::Copy => "COPY",
            InstructionKind::Run => "RUN",
            InstructionKind::Other(keyword) => keyword,
        }
    }
}

pub fn logical_lines(content: &[u8]) -> Result<Vec<Instruction>, Error> {
    let text = std::str::from_utf8(content)
        .map_err(|err| Error::dockerfile_parse(format!("content is not valid utf-8: {err}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let Some((line_number, last_line)) = last_instruction_line(text) else {
        return Ok(Vec::new());
    };
    if ends_with_continuation(last_line) {
        return Err(Error::dockerfile_parse(format!(
            "unterminated line continuation at line {line_number}"
        )));
    }

    let regions = instruction_regions(text);
    let line_index = LineIndex::new(text);
    for region in &regions {
        if has_heredoc(&join_continuations(&text[region.start..region.end])) {
            return Err(Error::dockerfile_parse(format!(
                "heredocs are not supported (line {})",
                line_index.line_for_offset(region.start)
            )));
        }
    }

    // dockerfile-parser only takes one name=value pair per ARG; the extra
    // pairs are blanked out with offsets kept, and read back from `text`.
    let masked = mask_extra_arg_pairs(text, &regions);
    let dockerfile =
        Dockerfile::parse(&masked).map_err(|err| Error::dockerfile_parse(format!("{err}")))?;

    dockerfile
        .instructions
        .iter()
        .map(|instruction| map_instruction(instruction, text, &regions, &line_index))
        .collect()
}

fn map_instruction(
    instruction: &ParsedInstruction,
    content: &str,
    regions: &[Region],
    line_index: &LineIndex,
) -> Result<Instruction, Error> {
    let span = instruction.span();
    let mut end = span.end;
    if let ParsedInstruction::Arg(_) = instruction {
        if let Some(region) = regions
            .iter()
            .find(|region| region.start <= span.start && span.start < region.end)
        {
            end = end.max(region.end);
        }
    }
    let text = join_continuations(span_slice(content, span.start, end)?);

    let kind = match instruction {
        ParsedInstruction::From(from) => InstructionKind::From {
            image: from.image.content.clone(),
            alias: from.alias.as_ref().map(|alias| alias.content.clone()),
        },
        ParsedInstruction::Arg(_) => InstructionKind::Arg(arg_declarations(&text)),
        ParsedInstruction::Run(_) => InstructionKind::Run,
        ParsedInstruction::Copy(_) => InstructionKind::Copy,
        ParsedInstruction::Label(_) => InstructionKind::Other("LABEL".to_string()),
        ParsedInstruction::Entrypoint(_) => InstructionKind::Other("ENTRYPOINT".to_string()),
        ParsedInstruction::Cmd(_) => InstructionKind::Other("CMD".to_string()),
        ParsedInstruction::Env(_) => InstructionKind::Other("ENV".to_string()),
        ParsedInstruction::Misc(misc) => {
            match misc.instruction.content.to_ascii_uppercase().as_str() {
                "COPY" => InstructionKind::Copy,
                "RUN" => InstructionKind::Run,
                keyword => InstructionKind::Other(keyword.to_string()),
            }
        }
    };

    let start_line = line_index.line_for_offset(span.start);
    let end_line = if end > span.start {
        line_index.line_for_offset(end - 1)
    } else {
        start_line
    };

    Ok(Instruction {
        kind,
        text,
        start_line,
        end_line,
    })
}

fn span_slice(content: &str, start: usize, end: usize) -> Result<&str, Error> {
    if start > end || end > content.len() {
        return Err(Error::dockerfile_parse(format!(
            "invalid instruction span {start}..{end}"
        )));
    }
    content
        .get(start..end)
        .ok_or_else(|| Error::dockerfile_parse(format!("invalid utf-8 in span {start}..{end}")))
}

// Blank and comment lines inside a continuation are skipped.
pub(crate) fn join_continuations(raw: &str) -> String {
    let mut pieces = Vec::new();
    for (index, line) in raw.split('\n').enumerate() {
        let line = line.trim();
        if index > 0 && (line.is_empty() || line.starts_with('#')) {
            continue;
        }
        let line = line.strip_suffix('\\').map_or(line, str::trim_end);
        if !line.is_empty() {
            pieces.push(line);
        }
    }
    pieces.join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    start: usize,
    end: usize,
}

// Byte ranges of logical instructions, from the first physical line to the
// end of the last continued one (newline excluded).
fn instruction_regions(text: &str) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut current: Option<usize> = None;
    let mut offset = 0;

    for line in text.split('\n') {
        let line_start = offset;
        let line_end = offset + line.len();
        offset = line_end + 1;

        let trimmed = line.trim();
        let skipped = trimmed.is_empty() || trimmed.starts_with('#');
        let start = match current {
            Some(_) if skipped => continue,
            Some(start) => start,
            None if skipped => continue,
            None => line_start,
        };

        if ends_with_continuation(line) {
            current = Some(start);
        } else {
            current = None;
            regions.push(Region {
                start,
                end: line_end,
            });
        }
    }

    regions
}

fn mask_extra_arg_pairs(text: &str, regions: &[Region]) -> String {
    let mut bytes = text.as_bytes().to_vec();

    for region in regions {
        let raw = &text[region.start..region.end];
        let joined = join_continuations(raw);
        let words = shell_words(&joined);
        let is_arg = words
            .first()
            .is_some_and(|word| word.eq_ignore_ascii_case("ARG"));
        if !is_arg || words.len() < 3 {
            continue;
        }

        let first_line = raw.split('\n').next().unwrap_or_default();
        let line_words = word_spans(first_line);
        let Some(&(pair_start, pair_end)) = line_words.get(1) else {
            continue;
        };
        if &first_line[pair_start..pair_end] == "\\" {
            continue;
        }

        for byte in &mut bytes[region.start + pair_end..region.end] {
            if *byte != b'\n' {
                *byte = b' ';
            }
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

fn arg_declarations(text: &str) -> Vec<ArgDeclaration> {
    shell_words(text)
        .into_iter()
        .skip(1)
        .map(|word| match word.split_once('=') {
            Some((name, value)) => ArgDeclaration {
                name: name.to_string(),
                default: Some(unquote(value).to_string()),
            },
            None => ArgDeclaration {
                name: word.to_string(),
                default: None,
            },
        })
        .collect()
}

fn has_heredoc(text: &str) -> bool {
    shell_words(text).iter().skip(1).any(|word| {
        word.strip_prefix("<<").is_some_and(|rest| {
            rest.trim_start_matches('-')
                .bytes()
                .next()
                .is_some_and(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'"' | b'\''))
        })
    })
}

fn shell_words(text: &str) -> Vec<&str> {
    word_spans(text)
        .into_iter()
        .map(|(start, end)| &text[start..end])
        .collect()
}

// Whitespace separated words; quoted whitespace stays inside the word.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    let mut quote = None;

    for (index, ch) in text.char_indices() {
        match quote {
            Some(open) => {
                if ch == open {
                    quote = None;
                }
            }
            None if ch.is_whitespace() => {
                if let Some(word_start) = start.take() {
                    spans.push((word_start, index));
                }
            }
            None => {
                if start.is_none() {
                    start = Some(index);
                }
                if ch == '"' || ch == '\'' {
                    quote = Some(ch);
                }
            }
        }
    }
    if let Some(word_start) = start {
        spans.push((word_start, text.len()));
    }

    spans
}

fn last_instruction_line(text: &str) -> Option<(usize, &str)> {
    text.split('\n')
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .last()
        .map(|(index, line)| (index + 1, line))
}

fn ends_with_continuation(line: &str) -> bool {
    line.trim_end().ends_with('\\')
}

pub(crate) fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    let quoted = bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0];
    if quoted { &value[1..value.len() - 1] } else { value }
}

struct LineIndex {
    newline_offsets: Vec<usize>,
}

impl LineIndex {
    fn new(content: &str) -> Self {
        let newline_offsets = content
            .as_bytes()
            .iter()
            .enumerate()
            .filter_map(|(index, byte)| (*byte == b'\n').then_some(index))
            .collect();
        Self { newline_offsets }
    }

    fn line_for_offset(&self, offset: usize) -> usize {
        self.newline_offsets
            .partition_point(|value| *value < offset)
            + 1
    }
}
