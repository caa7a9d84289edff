//! Intermediate representation for catalog functions and argument trees

use serde::{Deserialize, Serialize};

/// One row of the flat catalog export, as read from the CSV
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatArgument {
    pub object_id: u32,
    pub subprogram_id: u32,
    pub package_name: String,
    pub object_name: String,
    pub last_ddl: String,
    pub argument_name: String,
    pub in_out: String,
    pub data_level: u8,
    pub position: u32,
    pub data_type: String,
    pub data_precision: u8,
    pub data_scale: u8,
    pub character_set_name: String,
    pub pls_type: String,
    pub char_length: u32,
    pub type_owner: String,
    pub type_name: String,
    pub type_subname: String,
    pub type_link: String,
}

impl FlatArgument {
    /// Fully qualified `package.object` name of the owning subprogram
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.package_name, self.object_name)
    }

    /// Grouping key: rows of one subprogram share both ids
    pub fn key(&self) -> (u32, u32) {
        (self.object_id, self.subprogram_id)
    }
}

/// Parameter direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    In,
    Out,
    InOut,
}

impl Direction {
    /// Parse the raw `IN_OUT` catalog text; anything unrecognized is an input
    pub fn parse(raw: &str) -> Self {
        let has_in = raw.contains("IN");
        let has_out = raw.contains("OUT");
        match (has_in, has_out) {
            (true, true) => Direction::InOut,
            (false, true) => Direction::Out,
            _ => Direction::In,
        }
    }

    pub fn is_input(self) -> bool {
        !matches!(self, Direction::Out)
    }

    pub fn is_output(self) -> bool {
        !matches!(self, Direction::In)
    }
}

/// Structural flavor of an argument
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ArgKind {
    /// Scalar leaf
    #[default]
    Simple,
    /// Ordered named fields
    Record { fields: Vec<Argument> },
    /// Homogeneous collection; `element` is filled during tree building
    Table { element: Option<Box<Argument>> },
}

impl ArgKind {
    /// Derive the flavor from the catalog type tag
    pub fn from_data_type(data_type: &str) -> Self {
        match data_type {
            "PL/SQL RECORD" => ArgKind::Record { fields: Vec::new() },
            "PL/SQL TABLE" | "TABLE" | "VARRAY" | "REF CURSOR" => {
                ArgKind::Table { element: None }
            }
            _ => ArgKind::Simple,
        }
    }

    pub fn is_composite(&self) -> bool {
        !matches!(self, ArgKind::Simple)
    }
}

/// A node of the reconstructed argument tree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub direction: Direction,
    pub kind: ArgKind,
    pub data_type: String,
    pub pls_type: String,
    pub character_set_name: String,
    pub data_precision: u8,
    pub data_scale: u8,
    pub char_length: u32,
    pub type_owner: String,
    pub type_name: String,
    pub type_subname: String,
    pub type_link: String,
}

impl Argument {
    /// Build a tree node from a flat row; composite children start empty
    pub fn from_flat(row: &FlatArgument) -> Self {
        Argument {
            name: row.argument_name.clone(),
            direction: Direction::parse(&row.in_out),
            kind: ArgKind::from_data_type(&row.data_type),
            data_type: row.data_type.clone(),
            pls_type: row.pls_type.clone(),
            character_set_name: row.character_set_name.clone(),
            data_precision: row.data_precision,
            data_scale: row.data_scale,
            char_length: row.char_length,
            type_owner: row.type_owner.clone(),
            type_name: row.type_name.clone(),
            type_subname: row.type_subname.clone(),
            type_link: row.type_link.clone(),
        }
    }

    pub fn is_cursor(&self) -> bool {
        self.data_type == "REF CURSOR"
    }
}

/// A stored subprogram with its reconstructed argument trees
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Function {
    pub package: String,
    pub name: String,
    /// Set by a rename annotation; preferred over `name` for display
    pub alias: Option<String>,
    pub last_ddl: String,
    pub args: Vec<Argument>,
    pub returns: Option<Argument>,
    /// Set by a replace annotation; owns the function it stands in for
    pub replacement: Option<Box<Function>>,
    pub replacement_is_json: bool,
    /// Handler tags broadcast by handle annotations
    pub handlers: Vec<String>,
    pub max_table_size: u32,
}

impl Function {
    /// Qualified display name, preferring the alias when one is set
    pub fn name(&self) -> String {
        let nm = self.alias.as_deref().unwrap_or(&self.name);
        if self.package.is_empty() {
            nm.to_string()
        } else {
            format!("{}.{}", self.package, nm)
        }
    }

    /// Qualified declared name, ignoring any alias
    pub fn real_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    /// True when any output, the return value included, is a ref cursor
    pub fn returns_cursor(&self) -> bool {
        if self.returns.as_ref().is_some_and(|r| r.is_cursor()) {
            return true;
        }
        self.args
            .iter()
            .any(|a| a.direction.is_output() && a.is_cursor())
    }
}
