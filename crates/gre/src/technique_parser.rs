//! Technique files
//!
//! Technique files declare programs, and the techniques using them, with a bracket based
//! syntax:
//! ```text
//! [Program basic] {
//!     [Vertex] { [GLSL "basic.vert"] }
//!     [Fragment] { [GLSL "basic.frag"] }
//! }
//!
//! [Technique Default] {
//!     [Program basic]
//!     [LightingMode PerFragment]
//!     [Alias ModelMatrix "uModel"]
//!     [Attribute Position "aPosition"]
//! }
//! ```
//! A definition is a list of words between square brackets, optionally followed by a block in
//! curly brackets, which contains more definitions. A word starts with a letter and goes on
//! with letters and digits; anything else has to be quoted.
//!
//! Files are processed in three passes: [`parse_tree`] builds the definition tree,
//! [`convert_tree`] interprets it, and [`create_techniques`] creates the resources. Malformed
//! parts are reported with warnings, and skipped.

use crate::{
    graphics::{ProgramManager, ShaderPathTable, ShaderPathTableList, ShaderType},
    handle::Holder,
    manager::Manager,
    scene::{LightingMode, Technique, TechniqueParam, VertexAttrib},
};
use gre_utils::{AnyResult, ReadFileExt};
use log::*;
use std::{fs, path::Path};

/// A `[words...]` definition, with the definitions of its block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TechniqueFileNode {
    pub words: Vec<String>,
    pub has_block: bool,
    pub children: Vec<TechniqueFileNode>,
}

impl TechniqueFileNode {
    fn keyword(&self) -> Option<&str> {
        self.words.first().map(String::as_str)
    }

    /// The second word, naming what the definition declares.
    fn declared_name(&self) -> &str {
        self.words.get(1).map_or("", String::as_str)
    }
}

/// Top level definitions of a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TechniqueFileRoot {
    pub children: Vec<TechniqueFileNode>,
}

#[derive(Debug, Clone, Default)]
pub struct TechniqueFileProgram {
    pub name: String,
    pub shaders: ShaderPathTableList,
}

#[derive(Debug, Clone, Default)]
pub struct TechniqueFileTechnique {
    pub name: String,
    /// Name of the program, which may be declared anywhere in the file
    pub program: Option<String>,
    pub lighting_mode: LightingMode,
    pub aliases: Vec<(TechniqueParam, String)>,
    pub attributes: Vec<(VertexAttrib, String)>,
}

/// Interpreted content of a file. A declaration replaces any former one with the same name.
#[derive(Debug, Clone, Default)]
pub struct TechniqueFileContext {
    pub programs: Vec<TechniqueFileProgram>,
    pub techniques: Vec<TechniqueFileTechnique>,
}

impl TechniqueFileContext {
    pub fn program(&self, name: &str) -> Option<&TechniqueFileProgram> {
        self.programs.iter().find(|p| p.name == name)
    }

    pub fn technique(&self, name: &str) -> Option<&TechniqueFileTechnique> {
        self.techniques.iter().find(|t| t.name == name)
    }
}

/// First pass: builds the definition tree. `None` if the source has no definition at all.
pub fn parse_tree(source: &str) -> Option<TechniqueFileRoot> {
    source.find('[')?;
    Some(TechniqueFileRoot {
        children: parse_block(source),
    })
}

fn parse_block(source: &str) -> Vec<TechniqueFileNode> {
    let mut nodes = vec![];
    let mut pos = 0;

    while let Some(begin) = find_from(source, pos, '[') {
        let Some(end) = find_from(source, begin, ']') else {
            warn!("Definition end `]` not found, ignoring the rest of the block");
            break;
        };

        let mut node = TechniqueFileNode {
            words: definition_words(&source[begin + 1..end]),
            ..Default::default()
        };
        pos = end + 1;

        if source[pos..].trim_start().starts_with('{') {
            let block_begin = pos + (source[pos..].len() - source[pos..].trim_start().len());
            let Some(block_end) = find_block_end(source, block_begin) else {
                warn!("Block end `}}` not found, ignoring the rest of the block");
                break;
            };
            node.has_block = true;
            node.children = parse_block(&source[block_begin + 1..block_end]);
            pos = block_end + 1;
        }

        nodes.push(node);
    }

    nodes
}

fn find_from(source: &str, from: usize, c: char) -> Option<usize> {
    source[from..].find(c).map(|index| from + index)
}

/// Position of the `}` closing the block opened at `begin`.
fn find_block_end(source: &str, begin: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (index, c) in source[begin..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(begin + index);
                }
            }
            _ => {}
        }
    }
    None
}

fn definition_words(definition: &str) -> Vec<String> {
    let mut words = vec![];
    let mut chars = definition.char_indices().peekable();

    while let Some((begin, c)) = chars.next() {
        if c.is_ascii_alphabetic() {
            let mut end = begin + c.len_utf8();
            while let Some((index, c)) = chars.next_if(|(_, c)| c.is_ascii_alphanumeric()) {
                end = index + c.len_utf8();
            }
            words.push(definition[begin..end].to_owned());
        } else if c == '"' {
            let content = begin + 1;
            match definition[content..].find('"') {
                Some(length) => {
                    words.push(definition[content..content + length].to_owned());
                    // Skip the string and its closing quote
                    while chars.next_if(|(index, _)| *index <= content + length).is_some() {}
                }
                None => {
                    warn!("Unterminated string in definition `[{definition}]`");
                    break;
                }
            }
        }
    }

    words
}

/// Second pass: interprets the definition tree. `None` if the tree is empty.
pub fn convert_tree(root: &TechniqueFileRoot) -> Option<TechniqueFileContext> {
    if root.children.is_empty() {
        return None;
    }

    let mut context = TechniqueFileContext::default();
    for node in &root.children {
        match node.keyword() {
            None => continue,
            Some("Program") => {
                let program = convert_program(node);
                context.programs.retain(|p| p.name != program.name);
                context.programs.push(program);
            }
            Some("Technique") => {
                let technique = convert_technique(node);
                context.techniques.retain(|t| t.name != technique.name);
                context.techniques.push(technique);
            }
            Some(other) => warn!("Unknown definition `{other}`"),
        }
    }
    Some(context)
}

fn convert_program(node: &TechniqueFileNode) -> TechniqueFileProgram {
    let mut program = TechniqueFileProgram {
        name: node.declared_name().to_owned(),
        ..Default::default()
    };

    for stage in &node.children {
        let Some(keyword) = stage.keyword() else {
            continue;
        };
        let kind = match keyword {
            "Vertex" => ShaderType::Vertex,
            "Fragment" => ShaderType::Fragment,
            other => {
                warn!("Program `{}`: unknown shader stage `{other}`", program.name);
                continue;
            }
        };

        let mut table = ShaderPathTable::new();
        for path in stage.children.iter().filter(|p| p.words.len() >= 2) {
            table.insert(path.words[0].as_str(), path.words[1].as_str());
        }
        program.shaders.add(kind, table);
    }

    program
}

fn convert_technique(node: &TechniqueFileNode) -> TechniqueFileTechnique {
    let mut technique = TechniqueFileTechnique {
        name: node.declared_name().to_owned(),
        ..Default::default()
    };

    for declaration in &node.children {
        let words = &declaration.words;
        match (words.first().map(String::as_str), words.len()) {
            (None, _) => continue,
            (Some("Attribute"), 3..) => match VertexAttrib::try_from(words[1].as_str()) {
                Ok(attrib) => technique.attributes.push((attrib, words[2].clone())),
                Err(_) => warn!(
                    "Technique `{}`: unknown attribute `{}`",
                    technique.name, words[1]
                ),
            },
            (Some("Alias"), 3..) => match TechniqueParam::try_from(words[1].as_str()) {
                Ok(param) => technique.aliases.push((param, words[2].clone())),
                Err(_) => warn!(
                    "Technique `{}`: unknown parameter `{}`",
                    technique.name, words[1]
                ),
            },
            (Some("LightingMode"), 2..) => match LightingMode::try_from(words[1].as_str()) {
                Ok(mode) => technique.lighting_mode = mode,
                Err(_) => warn!(
                    "Technique `{}`: unknown lighting mode `{}`",
                    technique.name, words[1]
                ),
            },
            (Some("Program"), 2..) => technique.program = Some(words[1].clone()),
            (Some(other), _) => warn!(
                "Technique `{}`: unknown declaration `{other}`",
                technique.name
            ),
        }
    }

    technique
}

/// Third pass: creates and finalizes the programs, then creates the techniques.
///
/// Programs whose shaders can't be loaded are skipped. Techniques whose name is already taken
/// are skipped too.
pub fn create_techniques(
    context: &TechniqueFileContext,
    programs: &ProgramManager,
    techniques: &Manager<Technique>,
) -> Vec<Holder<Technique>> {
    for program in &context.programs {
        let created = programs.create_program(&program.name, &program.shaders);
        if let Some(created) = created.try_get() {
            if !created.is_finalized() {
                warn!("Program `{}` couldn't be finalized", program.name);
            }
        }
    }

    let mut created = vec![];
    for declared in &context.techniques {
        let technique = techniques.load_blank(&declared.name);
        let Some(t) = technique.try_get() else {
            continue;
        };

        if let Some(name) = &declared.program {
            let program = programs.get_program(name);
            if program.is_invalid() {
                warn!("Technique `{}`: no program named `{name}`", declared.name);
            } else {
                t.set_program(program);
            }
        }
        t.set_lighting_mode(declared.lighting_mode);
        for (param, name) in &declared.aliases {
            t.set_alias(*param, name.as_str());
        }
        for (attrib, name) in &declared.attributes {
            t.set_attrib_name(*attrib, name.as_str());
        }

        created.push(technique);
    }
    created
}

/// Runs the three passes over technique files.
pub struct TechniqueFileParser;

impl TechniqueFileParser {
    /// Processes the source of a technique file. `path` is only used for diagnostics.
    pub fn process(
        path: &str,
        source: &str,
        programs: &ProgramManager,
        techniques: &Manager<Technique>,
    ) -> Vec<Holder<Technique>> {
        if source.is_empty() {
            return vec![];
        }

        let Some(root) = parse_tree(source) else {
            warn!("Technique file `{path}` has no definitions");
            return vec![];
        };
        let Some(context) = convert_tree(&root) else {
            warn!("Technique file `{path}` couldn't be interpreted");
            return vec![];
        };

        let created = create_techniques(&context, programs, techniques);
        if created.is_empty() {
            warn!("Technique file `{path}` didn't create any technique");
        } else {
            debug!(
                "Technique file `{path}` created {} techniques",
                created.len()
            );
        }
        created
    }

    /// Reads and processes a technique file.
    pub fn process_file(
        path: impl AsRef<Path>,
        programs: &ProgramManager,
        techniques: &Manager<Technique>,
    ) -> AnyResult<Vec<Holder<Technique>>> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).reading("technique file", path)?;
        Ok(Self::process(
            &path.display().to_string(),
            &source,
            programs,
            techniques,
        ))
    }
}
