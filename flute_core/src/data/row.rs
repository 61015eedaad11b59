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

use std::ops::Index;
use crate::{FluteDataError, FluteValue, FromFluteValue};

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Row {
    pub columns: Vec<String>,
    pub data: Vec<FluteValue>,
}

impl Row {
    pub fn new(columns: Vec<String>, data: Vec<FluteValue>) -> Self {
        Self { columns, data }
    }

    /// Returns length of a row.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns columns of this row.
    pub fn columns_ref(&self) -> &[String] {
        &self.columns
    }

    pub fn iter(&self) -> RowIter<'_> {
        RowIter {
            columns: &self.columns,
            data: &self.data,
            index: 0,
        }
    }

    pub fn get_value(&self, index: usize) -> Option<&FluteValue> {
        self.data.get(index)
    }

    /// Column lookup ignoring case, since drivers disagree on the case of
    /// catalog result-set labels.
    pub fn get_value_by_column(&self, column: &str) -> Option<&FluteValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|idx| self.data.get(idx))
    }

    /// Converts the named column to `T`. A missing column is an error.
    pub fn get<T>(&self, column: &str) -> Result<T, FluteDataError>
    where
        T: FromFluteValue,
    {
        let value = self
            .get_value_by_column(column)
            .ok_or_else(|| FluteDataError::NoSuchColumn(column.to_string()))?;
        T::from_value_opt(value)
    }

    /// Like [`Row::get`], but a missing column or a null reads as `None`.
    pub fn get_opt<T>(&self, column: &str) -> Result<Option<T>, FluteDataError>
    where
        T: FromFluteValue,
    {
        match self.get_value_by_column(column) {
            Some(value) => Option::<T>::from_value_opt(value),
            None => Ok(None),
        }
    }

    pub fn set_value(&mut self, index: usize, value: FluteValue) -> Result<(), FluteDataError> {
        if index < self.data.len() {
            self.data[index] = value;
            Ok(())
        } else {
            Err(FluteDataError::IndexOutOfBounds(index, self.data.len()))
        }
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(column))
    }

    pub fn into_data(self) -> Vec<FluteValue> {
        self.data
    }
}

impl Index<usize> for Row {
    type Output = FluteValue;

    fn index(&self, index: usize) -> &FluteValue {
        &self.data[index]
    }
}

/// Iterator of the line
pub struct RowIter<'a> {
    columns: &'a [String],
    data: &'a [FluteValue],
    index: usize,
}

impl<'a> Iterator for RowIter<'a> {
    type Item = (&'a String, &'a FluteValue);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index < self.columns.len() && self.index < self.data.len() {
            let column = &self.columns[self.index];
            let value = &self.data[self.index];
            self.index += 1;
            Some((column, value))
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.columns.len().min(self.data.len()).saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}
