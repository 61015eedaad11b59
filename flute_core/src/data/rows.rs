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

use std::fmt::Formatter;
use std::slice;
use crate::Row;

/// use this to store data retrieved from the database
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Rows {
    pub data: Vec<Row>,
    /// can be optionally set, indicates how many total rows are there in the table
    pub count: Option<usize>,
}

impl std::fmt::Display for Rows {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "<==    Columns: {}", self.columns().join(", "))?;
        for data in self.data.iter() {
            writeln!(f, "<==        Row: {}", data.data.iter().map(|v| v.to_string()).collect::<Vec<String>>().join(", "))?;
        }
        write!(f, "<==      Total: {}", self.count.unwrap_or(self.data.len()))
    }
}

impl Rows {
    pub fn new() -> Self {
        Rows {
            data: vec![],
            count: None,
        }
    }

    /// Returns true if the row has a length of 0.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn push(&mut self, row: Row) {
        self.data.push(row)
    }

    /// Returns an iterator over the `Row`s.
    pub fn iter(&self) -> slice::Iter<'_, Row> {
        self.data.iter()
    }

    pub fn first(&self) -> Option<&Row> {
        self.data.first()
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.data.get(index)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Column labels of the first row, empty when there are no rows.
    pub fn columns(&self) -> Vec<String> {
        self.data.first().map(|row| row.columns.clone()).unwrap_or_default()
    }

    pub fn into_inner(self) -> Vec<Row> {
        self.data
    }
}

impl From<Vec<Row>> for Rows {
    fn from(data: Vec<Row>) -> Self {
        Rows { data, count: None }
    }
}

impl<'a> IntoIterator for &'a Rows {
    type Item = &'a Row;
    type IntoIter = slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for Rows {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FluteValue;

    #[test]
    fn test_display_layout() {
        let mut rows = Rows::new();
        rows.push(Row::new(vec!["ID".to_string(), "NAME".to_string()], vec![FluteValue::Int(1), FluteValue::from("a")]));
        assert_eq!(rows.to_string(), "<==    Columns: ID, NAME\n<==        Row: 1, 'a'\n<==      Total: 1");
    }
}
