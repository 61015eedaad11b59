/*
 *
 *  *
 *  *      Copyright (c) 2018-2025, SnackCloud All rights reserved.
 *  *
 *  *   Redistribution and use in source and binary forms, with or without
 *  *   modification, are permitted provided that the following conditions are met:
 *  *
 *  *   Redistributions of source code must retain the above copyright notice,
 *  *   this list of conditions and the following disclaimer.
 *  *   Redistributions in binary form must reproduce the above copyright
 *  *   notice, this list of conditions and the following disclaimer in the
 *  *   documentation and/or other materials provided with the distribution.
 *  *   Neither the name of the www.snackcloud.cn developer nor the names of its
 *  *   contributors may be used to endorse or promote products derived from
 *  *   this software without specific prior written permission.
 *  *   Author: SnackCloud
 *  *
 *
 */

//!
//! Multi-section diagnostic messages attached to errors.
//!

use std::fmt::Write;
use crate::driver::DatabaseMetaData;

const HEADER: &str = "Look! Read the message below.";
const OPEN: &str = "/* * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * *";
const CLOSE: &str = "* * * * * * * * * */";

#[derive(Debug, Default, Clone)]
pub struct ExceptionMessageBuilder {
    notice: Option<String>,
    advice: Vec<String>,
    items: Vec<(String, Vec<String>)>,
}

impl ExceptionMessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notice<T: Into<String>>(mut self, notice: T) -> Self {
        self.notice = Some(notice.into());
        self
    }

    pub fn advice<T: Into<String>>(mut self, line: T) -> Self {
        self.advice.push(line.into());
        self
    }

    /// Starts a new `[title]` section.
    pub fn item<T: Into<String>>(mut self, title: T) -> Self {
        self.items.push((title.into(), Vec::new()));
        self
    }

    /// Adds an element to the last item.
    pub fn element<T: ToString>(mut self, element: T) -> Self {
        match self.items.last_mut() {
            Some((_, elements)) => elements.push(element.to_string()),
            None => self.items.push(("Element".to_string(), vec![element.to_string()])),
        }
        self
    }

    /// Shortcut for an item with a single element.
    pub fn item_element<T: Into<String>, E: ToString>(self, title: T, element: E) -> Self {
        self.item(title).element(element)
    }

    pub fn diagnostics(mut self, diagnostics: &ConnectionDiagnostics) -> Self {
        for (title, value) in diagnostics.entries() {
            self = self.item_element(title, value);
        }
        self
    }

    pub fn build(&self) -> String {
        let mut sb = String::new();
        let _ = writeln!(sb, "{}", HEADER);
        let _ = writeln!(sb, "{}", OPEN);
        if let Some(notice) = &self.notice {
            let _ = writeln!(sb, "{}", notice);
        }
        if !self.advice.is_empty() {
            let _ = writeln!(sb);
            let _ = writeln!(sb, "[Advice]");
            for line in self.advice.iter() {
                let _ = writeln!(sb, "{}", line);
            }
        }
        for (title, elements) in self.items.iter() {
            let _ = writeln!(sb);
            let _ = writeln!(sb, "[{}]", title);
            for element in elements.iter() {
                let _ = writeln!(sb, "{}", element);
            }
        }
        sb.push_str(CLOSE);
        sb
    }
}

/// Connection facts shown with not-found errors. Anything the metadata
/// refuses to tell is left out.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConnectionDiagnostics {
    pub product_name: Option<String>,
    pub product_version: Option<String>,
    pub driver_name: Option<String>,
    pub url: Option<String>,
    pub user: Option<String>,
    pub catalog: Option<String>,
    pub schema: Option<String>,
}

impl ConnectionDiagnostics {
    pub fn collect(meta: &dyn DatabaseMetaData, catalog: Option<&str>, schema: Option<&str>) -> Self {
        Self {
            product_name: meta.database_product_name().ok(),
            product_version: meta.database_product_version().ok(),
            driver_name: meta.driver_name().ok(),
            url: meta.url().ok(),
            user: meta.user_name().ok(),
            catalog: catalog.map(ToString::to_string),
            schema: schema.map(ToString::to_string),
        }
    }

    fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = Vec::new();
        let product = match (&self.product_name, &self.product_version) {
            (Some(name), Some(version)) => Some(format!("{} {}", name, version)),
            (Some(name), None) => Some(name.clone()),
            _ => None,
        };
        let fields = [
            ("Database Product", product),
            ("JDBC Driver", self.driver_name.clone()),
            ("URL", self.url.clone()),
            ("User", self.user.clone()),
            ("Catalog", self.catalog.clone()),
            ("Schema", self.schema.clone()),
        ];
        for (title, value) in fields {
            if let Some(value) = value {
                entries.push((title, value));
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use crate::driver::fake::FakeMetaData;
    use super::*;

    #[test]
    fn test_build_sections() {
        let msg = ExceptionMessageBuilder::new()
            .notice("Not found the table.")
            .advice("Confirm the table name.")
            .item("Table")
            .element("MEMBER")
            .item("Tried Names")
            .element("MEMBER")
            .element("member")
            .build();
        let expected = "Look! Read the message below.\n\
/* * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * *\n\
Not found the table.\n\
\n\
[Advice]\n\
Confirm the table name.\n\
\n\
[Table]\n\
MEMBER\n\
\n\
[Tried Names]\n\
MEMBER\n\
member\n\
* * * * * * * * * */";
        assert_eq!(msg, expected);
    }

    #[test]
    fn test_diagnostics_skip_failures() {
        let meta = FakeMetaData::new("H2");
        let diagnostics = ConnectionDiagnostics::collect(&meta, None, Some("PUBLIC"));
        assert_eq!(diagnostics.user, None);
        assert_eq!(diagnostics.product_name.as_deref(), Some("H2"));
        let msg = ExceptionMessageBuilder::new().notice("n").diagnostics(&diagnostics).build();
        assert!(msg.contains("[Database Product]\nH2 1.0"));
        assert!(msg.contains("[Schema]\nPUBLIC"));
        assert!(!msg.contains("[User]"));
    }
}
