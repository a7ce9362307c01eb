//! Ordered joint identifiers with a fixed name to index lookup.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JointSetError {
    #[error("Duplicate joint name: {0}")]
    Duplicate(String),
    #[error("Joint set cannot be empty")]
    Empty,
}

/// The joints of one arm, fixed for the lifetime of a controller.
#[derive(Debug, Clone)]
pub struct JointSet {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl JointSet {
    pub fn new<I, S>(names: I) -> Result<Self, JointSetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(JointSetError::Empty);
        }
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(JointSetError::Duplicate(name.clone()));
            }
        }
        Ok(Self { names, index })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// First name in `requested` that is not part of this set.
    pub fn find_unknown<'a>(&self, requested: &'a [String]) -> Option<&'a str> {
        requested
            .iter()
            .find(|name| !self.contains(name))
            .map(String::as_str)
    }

    /// Every joint but the last one.
    pub fn arm_joints(&self) -> &[String] {
        &self.names[..self.names.len() - 1]
    }

    /// The last joint, driven independently of the rest of the arm.
    pub fn gripper(&self) -> &str {
        &self.names[self.names.len() - 1]
    }
}
