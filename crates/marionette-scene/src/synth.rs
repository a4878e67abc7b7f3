//! Multi-robot scene synthesis.
//!
//! The template's anchor body sub-tree is cloned once per spawn config and
//! every element name inside a clone is prefixed with `robot{i+1}_`. The
//! actuator entries are cloned the same way, with their joint references
//! rewritten under the same prefix. Everything else in the template is copied
//! through byte for byte.

use std::path::Path;

use marionette_core::types::{ANCHOR_BODY, MAX_ROBOTS, RobotSpawnConfig, prefixed_name};
use tracing::{debug, info};

use crate::error::SynthesisError;
use crate::scan::{self, Tag, TagKind};

/// Orientation specifiers replaced by the upright quaternion on clones.
const ORIENTATION_ATTRS: &[&str] = &["euler", "axisangle", "xyaxes", "zaxis"];

const UPRIGHT_QUAT: &str = "1 0 0 0";

/// Attributes of actuator entries that name or reference robot elements.
const ACTUATOR_REFS: &[&str] = &["name", "joint", "jointinparent", "site", "body"];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build a scene holding one robot per spawn config.
///
/// With a single config only the anchor body's `pos` attribute changes.
pub fn synthesize(template: &str, configs: &[RobotSpawnConfig]) -> Result<String, SynthesisError> {
    check_robot_count(configs.len())?;
    if let Some(index) = configs.iter().position(|c| !c.is_finite()) {
        return Err(SynthesisError::InvalidSpawn { index });
    }
    let tags = scan::tokenize(template)?;
    let anchor = find_anchor(template, &tags)?;
    let anchor_tag = tags[anchor];

    if let [config] = configs {
        let position = format_position(config);
        let rewritten = scan::set_attr(anchor_tag.text(template), "pos", &position);
        debug!(%position, "single robot scene, anchor moved");
        return Ok(splice(template, &anchor_tag, &rewritten));
    }

    let anchor_close = scan::element_end(&tags, anchor)?;
    let anchor_end = tags[anchor_close - 1].end;

    let block = find_actuator_block(template, &tags)?;
    let block_tag = tags[block];
    if block_tag.start < anchor_end {
        return Err(SynthesisError::Malformed(
            "actuator block must follow the anchor body".into(),
        ));
    }
    let (entries_start, entries_end) = if block_tag.kind == TagKind::Open {
        let block_close = scan::element_end(&tags, block)?;
        (block_tag.end, tags[block_close - 1].start)
    } else {
        (block_tag.end, block_tag.end)
    };

    let subtree = &template[anchor_tag.start..anchor_end];
    let entries = &template[entries_start..entries_end];
    let indent = line_indent(template, anchor_tag.start);

    let mut out =
        String::with_capacity(template.len() + (subtree.len() + entries.len()) * configs.len());
    out.push_str(&template[..anchor_tag.start]);
    for (index, config) in configs.iter().enumerate() {
        if index > 0 {
            out.push('\n');
            out.push_str(indent);
        }
        out.push_str(&clone_subtree(subtree, index, config)?);
    }
    out.push_str(&template[anchor_end..entries_start]);
    let last = configs.len() - 1;
    for index in 0..configs.len() {
        let group = clone_entries(entries, index)?;
        if index == last {
            out.push_str(&group);
        } else {
            out.push_str(group.trim_end());
        }
    }
    out.push_str(&template[entries_end..]);

    info!(
        robots = configs.len(),
        bytes = out.len(),
        "synthesized multi-robot scene"
    );
    Ok(out)
}

/// The template's own anchor position, as a spawn config.
///
/// A missing `pos` attribute is the MJCF default, the origin.
pub fn anchor_spawn(template: &str) -> Result<RobotSpawnConfig, SynthesisError> {
    let tags = scan::tokenize(template)?;
    let anchor = find_anchor(template, &tags)?;
    let Some(pos) = scan::attr(tags[anchor].text(template), "pos") else {
        return Ok(RobotSpawnConfig::default());
    };
    let coords: Vec<f64> = pos
        .value
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|e| SynthesisError::Malformed(format!("anchor pos '{}': {e}", pos.value)))?;
    match coords.as_slice() {
        &[x, y, z] => Ok(RobotSpawnConfig::new(x, y, z)),
        _ => Err(SynthesisError::Malformed(format!(
            "anchor pos '{}' is not x y z",
            pos.value
        ))),
    }
}

/// Read a scene template from disk.
pub fn load_template(path: impl AsRef<Path>) -> Result<String, SynthesisError> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|source| SynthesisError::TemplateLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a template from disk and synthesize a scene from it.
pub fn synthesize_file(
    template_path: impl AsRef<Path>,
    configs: &[RobotSpawnConfig],
) -> Result<String, SynthesisError> {
    let template = load_template(template_path)?;
    synthesize(&template, configs)
}

/// Write synthesized scene text where the physics engine will load it from.
pub fn write_scene(path: impl AsRef<Path>, scene: &str) -> Result<(), SynthesisError> {
    let path = path.as_ref();
    std::fs::write(path, scene).map_err(|source| SynthesisError::Write {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const fn check_robot_count(count: usize) -> Result<(), SynthesisError> {
    if count == 0 {
        return Err(SynthesisError::EmptyConfig);
    }
    if count > MAX_ROBOTS {
        return Err(SynthesisError::TooManyRobots(count));
    }
    Ok(())
}

fn find_anchor(template: &str, tags: &[Tag<'_>]) -> Result<usize, SynthesisError> {
    let found: Vec<usize> = tags
        .iter()
        .enumerate()
        .filter(|(_, tag)| {
            tag.is_element()
                && tag.name == "body"
                && scan::attr(tag.text(template), "name").is_some_and(|a| a.value == ANCHOR_BODY)
        })
        .map(|(i, _)| i)
        .collect();
    match found.as_slice() {
        [] => Err(SynthesisError::AnchorNotFound(ANCHOR_BODY.into())),
        [single] => Ok(*single),
        many => Err(SynthesisError::DuplicateAnchor {
            name: ANCHOR_BODY.into(),
            count: many.len(),
        }),
    }
}

fn find_actuator_block(template: &str, tags: &[Tag<'_>]) -> Result<usize, SynthesisError> {
    let found: Vec<usize> = tags
        .iter()
        .enumerate()
        .filter(|(_, tag)| tag.is_element() && tag.name == "actuator")
        .map(|(i, _)| i)
        .collect();
    match found.as_slice() {
        [] => Err(SynthesisError::ActuatorBlockNotFound),
        [single] => {
            debug!(offset = tags[*single].start, len = template.len(), "actuator block");
            Ok(*single)
        }
        many => Err(SynthesisError::DuplicateActuatorBlock(many.len())),
    }
}

/// Clone the anchor sub-tree for robot `index` and place it at `config`.
///
/// The primary robot keeps its names and orientation; only its `pos` moves.
fn clone_subtree(
    subtree: &str,
    index: usize,
    config: &RobotSpawnConfig,
) -> Result<String, SynthesisError> {
    let out = scan::rewrite_tags(subtree, |ordinal, tag, text| {
        if !tag.is_element() {
            return None;
        }
        let renamed = prefix_attrs(text, &["name"], index);
        Some(match (ordinal, index) {
            (0, 0) => scan::set_attr(&renamed, "pos", &format_position(config)),
            (0, _) => place_anchor(&renamed, config),
            _ => renamed,
        })
    })?;
    Ok(out)
}

/// Clone the actuator entries for robot `index`.
fn clone_entries(entries: &str, index: usize) -> Result<String, SynthesisError> {
    if index == 0 {
        return Ok(entries.to_owned());
    }
    let out = scan::rewrite_tags(entries, |_, tag, text| {
        tag.is_element()
            .then(|| prefix_attrs(text, ACTUATOR_REFS, index))
    })?;
    Ok(out)
}

/// Prefix the listed attributes of one tag for robot `index`.
fn prefix_attrs(tag: &str, attrs: &[&str], index: usize) -> String {
    let mut text = tag.to_owned();
    if index == 0 {
        return text;
    }
    for name in attrs {
        let Some(current) = scan::attr(&text, name).map(|a| a.value.to_owned()) else {
            continue;
        };
        if current.is_empty() {
            continue;
        }
        let renamed = prefixed_name(&current, index);
        if renamed != current {
            text = scan::set_attr(&text, name, &renamed);
        }
    }
    text
}

/// Set the anchor's position and replace its orientation with upright.
fn place_anchor(tag: &str, config: &RobotSpawnConfig) -> String {
    let mut text = scan::set_attr(tag, "pos", &format_position(config));
    for attr in ORIENTATION_ATTRS {
        text = scan::remove_attr(&text, attr);
    }
    scan::set_attr(&text, "quat", UPRIGHT_QUAT)
}

fn format_position(config: &RobotSpawnConfig) -> String {
    format!("{} {} {}", config.x, config.y, config.z)
}

fn splice(template: &str, tag: &Tag<'_>, replacement: &str) -> String {
    format!(
        "{}{replacement}{}",
        &template[..tag.start],
        &template[tag.end..]
    )
}

/// Leading whitespace of the line containing byte `at`, if nothing else
/// precedes `at` on that line.
fn line_indent(text: &str, at: usize) -> &str {
    let line_start = text[..at].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &text[line_start..at];
    if prefix.chars().all(char::is_whitespace) {
        prefix
    } else {
        ""
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
