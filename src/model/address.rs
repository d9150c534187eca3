//! Variable addresses: `name(.name|[index])*`

use crate::error::{BindingError, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AddressEntry {
    Name(String),
    Index(usize),
}

impl fmt::Display for AddressEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressEntry::Name(name) => write!(f, "{}", name),
            AddressEntry::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// A structured path into the bound data. The first entry is always a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataAddress {
    entries: Vec<AddressEntry>,
}

impl DataAddress {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            entries: vec![AddressEntry::Name(root.into())],
        }
    }

    /// Name of the top-level bound variable
    pub fn root(&self) -> &str {
        match self.entries.first() {
            Some(AddressEntry::Name(name)) => name,
            _ => "",
        }
    }

    pub fn entries(&self) -> &[AddressEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: AddressEntry) {
        self.entries.push(entry);
    }

    /// A copy of this address with one more entry appended
    pub fn child(&self, entry: AddressEntry) -> Self {
        let mut address = self.clone();
        address.push(entry);
        address
    }

    /// Replace the root entry with `prefix`, keeping the remaining entries
    pub fn rebase(&self, prefix: &DataAddress) -> Self {
        let mut entries = prefix.entries.clone();
        entries.extend(self.entries.iter().skip(1).cloned());
        Self { entries }
    }
}

impl fmt::Display for DataAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 && matches!(entry, AddressEntry::Name(_)) {
                write!(f, ".")?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}

/// Parse an address string such as `players[2].scores[0]`
pub fn parse_address(input: &str) -> Result<DataAddress> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(BindingError::address(input, "address is empty"));
    }

    let mut entries = Vec::new();

    for segment in trimmed.split('.') {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(BindingError::address(input, "empty segment"));
        }
        if segment.starts_with('[') {
            return Err(BindingError::address(input, format!("segment '{}' starts with '['", segment)));
        }

        let (name, mut rest) = match segment.find('[') {
            Some(open) => (&segment[..open], &segment[open..]),
            None => (segment, ""),
        };
        let name = name.trim_end();
        if name.contains(']') {
            return Err(BindingError::address(input, format!("unexpected ']' in name '{}'", name)));
        }
        entries.push(AddressEntry::Name(name.to_string()));

        while !rest.is_empty() {
            let close = rest
                .find(']')
                .ok_or_else(|| BindingError::address(input, "unterminated '['"))?;
            let index_text = rest[1..close].trim();
            let index = index_text.parse::<usize>().map_err(|_| {
                BindingError::address(input, format!("'{}' is not a valid array index", index_text))
            })?;
            entries.push(AddressEntry::Index(index));

            rest = rest[close + 1..].trim_start();
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(BindingError::address(
                    input,
                    format!("unexpected '{}' after array index", rest),
                ));
            }
        }
    }

    Ok(DataAddress { entries })
}
