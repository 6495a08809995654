// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Script parser for cast files
//!
//! Parses scripts with the format:
//! - @ directives (id, title, channel, tags, description)
//! - # comments
//! - step lines (say, bot, compose, edit, react, flag, wait, reset)
//! - "- ..." component lines attached to the preceding message step
//! - --- separators between scripts in one file

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    character::complete::{char, not_line_ending, space0, space1},
    combinator::{opt, value},
    sequence::preceded,
};
use thiserror::Error;

use crate::types::{Action, Component, Message, MessagePatch, Script, ScriptMeta, Step};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

const KEYWORDS: [&str; 8] = [
    "say", "bot", "compose", "edit", "react", "flag", "wait", "reset",
];

fn parse_word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')(input)
}

fn parse_delay(input: &str) -> IResult<&str, u64> {
    nom::character::complete::u64(input)
}

fn parse_index(input: &str) -> IResult<&str, usize> {
    let (input, index) = nom::character::complete::u64(input)?;
    Ok((input, index as usize))
}

fn parse_author(input: &str) -> IResult<&str, String> {
    let (input, author) = take_until(":")(input)?;
    let (input, _) = char(':')(input)?;
    Ok((input, author.trim().to_string()))
}

fn parse_say(input: &str) -> IResult<&str, Step> {
    let (input, _) = tag("say")(input)?;
    let (input, _) = space1(input)?;
    let (input, delay) = parse_delay(input)?;
    let (input, _) = space1(input)?;
    let (input, author) = parse_author(input)?;
    let (input, _) = space0(input)?;
    let (input, text) = not_line_ending(input)?;
    let message = Message {
        author,
        text: Some(text.to_string()),
        ..Default::default()
    };
    Ok((input, Step::new(delay, Action::Append(message))))
}

fn parse_bot(input: &str) -> IResult<&str, Step> {
    let (input, _) = tag("bot")(input)?;
    let (input, _) = space1(input)?;
    let (input, delay) = parse_delay(input)?;
    let (input, _) = space1(input)?;
    let (input, author) = parse_author(input)?;
    let (input, _) = space0(input)?;
    let (input, text) = not_line_ending(input)?;
    let message = Message {
        author,
        bot: true,
        text: Some(text.to_string()),
        ..Default::default()
    };
    Ok((input, Step::new(delay, Action::Append(message))))
}

// A bot message in composing state; a later edit fills it in.
fn parse_compose(input: &str) -> IResult<&str, Step> {
    let (input, _) = tag("compose")(input)?;
    let (input, _) = space1(input)?;
    let (input, delay) = parse_delay(input)?;
    let (input, _) = space1(input)?;
    let (input, author) = not_line_ending(input)?;
    let message = Message {
        author: author.trim().to_string(),
        bot: true,
        composing: true,
        ..Default::default()
    };
    Ok((input, Step::new(delay, Action::Append(message))))
}

fn parse_edit(input: &str) -> IResult<&str, Step> {
    let (input, _) = tag("edit")(input)?;
    let (input, _) = space1(input)?;
    let (input, delay) = parse_delay(input)?;
    let (input, _) = space1(input)?;
    let (input, index) = parse_index(input)?;
    let (input, _) = space0(input)?;
    let (input, text) = if input.starts_with(':') {
        let (input, _) = char(':')(input)?;
        let (input, _) = space0(input)?;
        let (input, text) = not_line_ending(input)?;
        (input, Some(text.to_string()))
    } else {
        (input, None)
    };
    let patch = MessagePatch {
        text,
        composing: Some(false),
        ..Default::default()
    };
    Ok((input, Step::new(delay, Action::Mutate { index, patch })))
}

fn parse_react(input: &str) -> IResult<&str, Step> {
    let (input, _) = tag("react")(input)?;
    let (input, _) = space1(input)?;
    let (input, delay) = parse_delay(input)?;
    let (input, _) = space1(input)?;
    let (input, index) = parse_index(input)?;
    let (input, _) = space1(input)?;
    let (input, reaction) = not_line_ending(input)?;
    let patch = MessagePatch {
        reaction: Some(reaction.trim().to_string()),
        ..Default::default()
    };
    Ok((input, Step::new(delay, Action::Mutate { index, patch })))
}

fn parse_flag(input: &str) -> IResult<&str, Step> {
    let (input, _) = tag("flag")(input)?;
    let (input, _) = space1(input)?;
    let (input, delay) = parse_delay(input)?;
    let (input, _) = space1(input)?;
    let (input, name) = parse_word(input)?;
    let (input, _) = space1(input)?;
    let (input, flag_value) = alt((value(true, tag("on")), value(false, tag("off")))).parse(input)?;
    Ok((
        input,
        Step::new(
            delay,
            Action::SetFlag {
                name: name.to_string(),
                value: flag_value,
            },
        ),
    ))
}

fn parse_wait(input: &str) -> IResult<&str, Step> {
    let (input, _) = tag("wait")(input)?;
    let (input, _) = space1(input)?;
    let (input, delay) = parse_delay(input)?;
    Ok((input, Step::new(delay, Action::Wait)))
}

fn parse_reset(input: &str) -> IResult<&str, Step> {
    let (input, _) = tag("reset")(input)?;
    let (input, delay) = opt(preceded(space1, parse_delay)).parse(input)?;
    Ok((input, Step::new(delay.unwrap_or(0), Action::Reset)))
}

// Unrecognized leading keyword: kept so playback can log and skip it.
// Known keywords are excluded so their malformed lines fail loudly.
fn parse_unknown(input: &str) -> IResult<&str, Step> {
    let (rest, keyword) = parse_word(input)?;
    if KEYWORDS.contains(&keyword) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    let (rest, _) = not_line_ending(rest)?;
    Ok((rest, Step::new(0, Action::Unknown(keyword.to_string()))))
}

fn parse_step(input: &str) -> IResult<&str, Step> {
    alt((
        parse_say,
        parse_bot,
        parse_compose,
        parse_edit,
        parse_react,
        parse_flag,
        parse_wait,
        parse_reset,
        parse_unknown,
    ))
    .parse(input)
}

fn parse_directive(input: &str) -> IResult<&str, (String, String)> {
    let (input, _) = tag("@")(input)?;
    let (input, _) = space0(input)?;
    let (input, key) = parse_word(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = char(':')(input)?;
    let (input, directive_value) = not_line_ending(input)?;
    Ok((input, (key.to_string(), directive_value.trim().to_string())))
}

enum ComponentLine {
    Plain(Component),
    Button(String),
}

fn parse_component(input: &str) -> IResult<&str, ComponentLine> {
    let (input, _) = char('-')(input)?;
    let (input, _) = space1(input)?;
    alt((comp_para, comp_file, comp_code, comp_button)).parse(input)
}

fn comp_para(input: &str) -> IResult<&str, ComponentLine> {
    let (input, _) = tag("para")(input)?;
    let (input, _) = space1(input)?;
    let (input, content) = not_line_ending(input)?;
    Ok((
        input,
        ComponentLine::Plain(Component::Paragraph(content.trim().to_string())),
    ))
}

fn comp_file(input: &str) -> IResult<&str, ComponentLine> {
    let (input, _) = tag("file")(input)?;
    let (input, _) = space1(input)?;
    let (input, rest) = not_line_ending(input)?;
    let rest = rest.trim();
    // "name (size)" with the size part optional
    let (name, size) = match rest.rfind('(') {
        Some(open) if rest.ends_with(')') => (
            rest[..open].trim(),
            rest[open + 1..rest.len() - 1].trim(),
        ),
        _ => (rest, ""),
    };
    Ok((
        input,
        ComponentLine::Plain(Component::FileAttachment {
            name: name.to_string(),
            size: size.to_string(),
        }),
    ))
}

fn comp_code(input: &str) -> IResult<&str, ComponentLine> {
    let (input, _) = tag("code")(input)?;
    let (input, _) = space1(input)?;
    let (input, content) = not_line_ending(input)?;
    Ok((
        input,
        ComponentLine::Plain(Component::CodeBlock(content.replace("\\n", "\n"))),
    ))
}

fn comp_button(input: &str) -> IResult<&str, ComponentLine> {
    let (input, _) = tag("button")(input)?;
    let (input, _) = space1(input)?;
    let (input, label) = not_line_ending(input)?;
    Ok((input, ComponentLine::Button(label.trim().to_string())))
}

#[derive(Default)]
struct ScriptBuilder {
    meta: ScriptMeta,
    steps: Vec<Step>,
    touched: bool,
}

impl ScriptBuilder {
    fn directive(&mut self, key: &str, directive_value: String) {
        self.touched = true;
        match key {
            "id" => self.meta.id = directive_value,
            "title" => self.meta.title = directive_value,
            "channel" => self.meta.channel = Some(directive_value),
            "description" => self.meta.description = Some(directive_value),
            "tags" => {
                self.meta.tags = directive_value
                    .split(',')
                    .map(|tag| tag.trim().to_string())
                    .filter(|tag| !tag.is_empty())
                    .collect();
            }
            _ => tracing::warn!(key, "ignoring unknown directive"),
        }
    }

    fn push_step(&mut self, step: Step) {
        self.touched = true;
        self.steps.push(step);
    }

    /// Attach a component line to the most recent message or edit step.
    fn attach(&mut self, line: ComponentLine) -> Result<(), String> {
        let step = self
            .steps
            .last_mut()
            .ok_or("component line must follow a message or edit step")?;

        let components = match &mut step.action {
            Action::Append(message) => &mut message.components,
            Action::Mutate { patch, .. } => patch.components.get_or_insert_with(Vec::new),
            _ => return Err("component line must follow a message or edit step".to_string()),
        };

        match line {
            ComponentLine::Plain(component) => components.push(component),
            // Consecutive button lines share one actions row.
            ComponentLine::Button(label) => match components.last_mut() {
                Some(Component::Actions(buttons)) => buttons.push(label),
                _ => components.push(Component::Actions(vec![label])),
            },
        }
        Ok(())
    }

    fn has_content(&self) -> bool {
        self.touched
    }

    fn finish(mut self, index: usize) -> Script {
        if self.meta.id.is_empty() {
            self.meta.id = format!("cast-{}", index + 1);
        }
        if self.meta.title.is_empty() {
            self.meta.title = self.meta.id.clone();
        }
        Script {
            meta: self.meta,
            steps: self.steps,
        }
    }
}

pub fn parse_playlist(input: &str) -> Result<Vec<Script>, ParseError> {
    let mut scripts = Vec::new();
    let mut builder = ScriptBuilder::default();

    for (line_num, line) in input.lines().enumerate() {
        let trimmed = line.trim();
        let err = |message: String| ParseError {
            line: line_num + 1,
            message,
        };

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if trimmed == "---" {
            if builder.has_content() {
                scripts.push(builder.finish(scripts.len()));
            }
            builder = ScriptBuilder::default();
            continue;
        }

        if trimmed.starts_with('@') {
            match parse_directive(trimmed) {
                Ok((remaining, (key, directive_value))) if remaining.trim().is_empty() => {
                    builder.directive(&key, directive_value);
                }
                _ => return Err(err(format!("malformed directive: '{}'", trimmed))),
            }
            continue;
        }

        if trimmed.starts_with('-') {
            match parse_component(trimmed) {
                Ok((remaining, component)) if remaining.trim().is_empty() => {
                    builder.attach(component).map_err(err)?;
                }
                _ => return Err(err(format!("malformed component line: '{}'", trimmed))),
            }
            continue;
        }

        match parse_step(trimmed) {
            Ok((remaining, step)) => {
                if !remaining.trim().is_empty() {
                    return Err(err(format!(
                        "unexpected text after step: '{}'",
                        remaining
                    )));
                }
                builder.push_step(step);
            }
            Err(e) => return Err(err(format!("parse error: {}", e))),
        }
    }

    if builder.has_content() {
        scripts.push(builder.finish(scripts.len()));
    }

    Ok(scripts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_say() {
        let input = "say 1000 Thomas Anderson: Can you complete this excel for me?";
        let (_, step) = parse_say(input).unwrap();
        assert_eq!(step.delay, Duration::from_millis(1000));
        match step.action {
            Action::Append(message) => {
                assert_eq!(message.author, "Thomas Anderson");
                assert_eq!(
                    message.text.as_deref(),
                    Some("Can you complete this excel for me?")
                );
                assert!(!message.bot);
                assert!(!message.composing);
            }
            other => panic!("expected append, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_compose() {
        let input = "compose 2500 xpander.ai";
        let (_, step) = parse_compose(input).unwrap();
        match step.action {
            Action::Append(message) => {
                assert_eq!(message.author, "xpander.ai");
                assert!(message.bot);
                assert!(message.composing);
                assert_eq!(message.text, None);
            }
            other => panic!("expected append, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_edit_with_text() {
        let input = "edit 0 1: Of course.";
        let (_, step) = parse_edit(input).unwrap();
        match step.action {
            Action::Mutate { index, patch } => {
                assert_eq!(index, 1);
                assert_eq!(patch.text.as_deref(), Some("Of course."));
                assert_eq!(patch.composing, Some(false));
            }
            other => panic!("expected mutate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_edit_without_text() {
        let input = "edit 0 2";
        let (_, step) = parse_edit(input).unwrap();
        match step.action {
            Action::Mutate { index, patch } => {
                assert_eq!(index, 2);
                assert_eq!(patch.text, None);
                assert_eq!(patch.composing, Some(false));
            }
            other => panic!("expected mutate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_react() {
        let input = "react 10 0 ⏳";
        let (_, step) = parse_react(input).unwrap();
        match step.action {
            Action::Mutate { index, patch } => {
                assert_eq!(index, 0);
                assert_eq!(patch.reaction.as_deref(), Some("⏳"));
                assert_eq!(patch.composing, None);
            }
            other => panic!("expected mutate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_flag() {
        let (_, step) = parse_flag("flag 800 thinking on").unwrap();
        assert_eq!(
            step.action,
            Action::SetFlag {
                name: "thinking".to_string(),
                value: true,
            }
        );

        let (_, step) = parse_flag("flag 10 thinking off").unwrap();
        assert_eq!(
            step.action,
            Action::SetFlag {
                name: "thinking".to_string(),
                value: false,
            }
        );
    }

    #[test]
    fn test_parse_wait_and_reset() {
        let (_, step) = parse_wait("wait 3000").unwrap();
        assert_eq!(step.action, Action::Wait);
        assert_eq!(step.delay, Duration::from_millis(3000));

        let (_, step) = parse_reset("reset").unwrap();
        assert_eq!(step.action, Action::Reset);
        assert_eq!(step.delay, Duration::ZERO);

        let (_, step) = parse_reset("reset 500").unwrap();
        assert_eq!(step.delay, Duration::from_millis(500));
    }

    #[test]
    fn test_unknown_keyword_is_preserved() {
        let (_, step) = parse_step("emote 300 celebration").unwrap();
        assert_eq!(step.action, Action::Unknown("emote".to_string()));
    }

    #[test]
    fn test_malformed_say_is_an_error() {
        // Known keyword with a missing colon must not degrade to Unknown.
        let result = parse_playlist("say 1000 Thomas Anderson hello");
        let error = result.unwrap_err();
        assert_eq!(error.line, 1);
    }

    #[test]
    fn test_component_before_step_is_an_error() {
        let result = parse_playlist("- para hello");
        assert_eq!(result.unwrap_err().line, 1);
    }

    #[test]
    fn test_directives_fill_metadata() {
        let input = r#"@ id: file-processing
@ title: Spreadsheet completion
@ channel: #agent-demo
@ tags: files, enrichment
reset
"#;
        let scripts = parse_playlist(input).unwrap();
        assert_eq!(scripts.len(), 1);
        let meta = &scripts[0].meta;
        assert_eq!(meta.id, "file-processing");
        assert_eq!(meta.title, "Spreadsheet completion");
        assert_eq!(meta.channel.as_deref(), Some("#agent-demo"));
        assert_eq!(meta.tags, vec!["files", "enrichment"]);
    }

    #[test]
    fn test_components_attach_to_preceding_message() {
        let input = r#"say 1000 Thomas Anderson: Can you complete this excel for me?
- file AI_Startups_Q3.xlsx (15 KB)
"#;
        let scripts = parse_playlist(input).unwrap();
        match &scripts[0].steps[0].action {
            Action::Append(message) => {
                assert_eq!(
                    message.components,
                    vec![Component::FileAttachment {
                        name: "AI_Startups_Q3.xlsx".to_string(),
                        size: "15 KB".to_string(),
                    }]
                );
            }
            other => panic!("expected append, got {:?}", other),
        }
    }

    #[test]
    fn test_file_component_without_size() {
        let input = "say 0 a: hi\n- file notes.txt\n";
        let scripts = parse_playlist(input).unwrap();
        match &scripts[0].steps[0].action {
            Action::Append(message) => {
                assert_eq!(
                    message.components,
                    vec![Component::FileAttachment {
                        name: "notes.txt".to_string(),
                        size: String::new(),
                    }]
                );
            }
            other => panic!("expected append, got {:?}", other),
        }
    }

    #[test]
    fn test_buttons_coalesce_into_one_actions_row() {
        let input = r#"compose 0 xpander.ai
edit 0 0
- para All done!
- button Scale DB Pool
- button View Full Logs
"#;
        let scripts = parse_playlist(input).unwrap();
        match &scripts[0].steps[1].action {
            Action::Mutate { patch, .. } => {
                assert_eq!(
                    patch.components.as_deref(),
                    Some(
                        &[
                            Component::Paragraph("All done!".to_string()),
                            Component::Actions(vec![
                                "Scale DB Pool".to_string(),
                                "View Full Logs".to_string(),
                            ]),
                        ][..]
                    )
                );
            }
            other => panic!("expected mutate, got {:?}", other),
        }
    }

    #[test]
    fn test_code_component_unescapes_newlines() {
        let input = "bot 0 xpander.ai: found it\n- code line one\\nline two\n";
        let scripts = parse_playlist(input).unwrap();
        match &scripts[0].steps[0].action {
            Action::Append(message) => {
                assert_eq!(
                    message.components,
                    vec![Component::CodeBlock("line one\nline two".to_string())]
                );
            }
            other => panic!("expected append, got {:?}", other),
        }
    }

    #[test]
    fn test_separator_splits_scripts() {
        let input = r#"@ id: first
say 100 a: one
---
@ id: second
say 100 b: two
"#;
        let scripts = parse_playlist(input).unwrap();
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[0].meta.id, "first");
        assert_eq!(scripts[1].meta.id, "second");
    }

    #[test]
    fn test_missing_id_gets_a_default() {
        let scripts = parse_playlist("say 100 a: hello\n").unwrap();
        assert_eq!(scripts[0].meta.id, "cast-1");
        assert_eq!(scripts[0].meta.title, "cast-1");
    }

    #[test]
    fn test_trailing_text_after_flag_is_an_error() {
        let result = parse_playlist("flag 100 thinking on extra");
        assert_eq!(result.unwrap_err().line, 1);
    }

    #[test]
    fn test_parse_full_script() {
        let input = r#"# Scripted demo
@ id: demo
@ title: Demo

reset
say 1000 Thomas Anderson: Can you complete this excel for me?
- file AI_Startups_Q3.xlsx (15 KB)
react 10 0 ⏳
flag 800 thinking on
compose 2500 xpander.ai
wait 3000
edit 0 1: Of course.
flag 10 thinking off
"#;
        let scripts = parse_playlist(input).unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].steps.len(), 8);
        assert!(scripts[0].lint().is_empty());
    }
}
