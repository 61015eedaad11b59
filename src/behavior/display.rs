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
use flute_core::FluteValue;

/// Embeds bound values into SQL text so a statement can be logged and
/// pasted into a SQL client as is.
#[derive(Debug, Clone)]
pub struct DisplaySqlBuilder {
    date_format: String,
    timestamp_format: String,
}

impl Default for DisplaySqlBuilder {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
        }
    }
}

impl DisplaySqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `chrono` format string.
    pub fn set_date_format(mut self, format: &str) -> Self {
        self.date_format = format.to_string();
        self
    }

    pub fn set_timestamp_format(mut self, format: &str) -> Self {
        self.timestamp_format = format.to_string();
        self
    }

    /// Replaces each `?` outside quoted literals and comments with the next value.
    /// Placeholders without a value are left as they are.
    pub fn build(&self, sql: &str, values: &[&FluteValue]) -> String {
        let mut display = String::with_capacity(sql.len() + values.len() * 8);
        let mut values = values.iter();
        let mut chars = sql.chars().peekable();
        let mut quote: Option<char> = None;
        while let Some(c) = chars.next() {
            match quote {
                Some(q) => {
                    display.push(c);
                    if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '\'' | '"' => {
                        quote = Some(c);
                        display.push(c);
                    }
                    '-' if chars.peek() == Some(&'-') => {
                        display.push(c);
                        for rest in chars.by_ref() {
                            display.push(rest);
                            if rest == '\n' {
                                break;
                            }
                        }
                    }
                    '?' => match values.next() {
                        Some(value) => display.push_str(&self.literal(value)),
                        None => display.push(c),
                    },
                    _ => display.push(c),
                },
            }
        }
        display
    }

    pub fn literal(&self, value: &FluteValue) -> String {
        match value {
            FluteValue::Date(v) => format!("'{}'", v.format(&self.date_format)),
            FluteValue::DateTime(v) => format!("'{}'", v.format(&self.timestamp_format)),
            FluteValue::Timestamp(v) => format!("'{}'", v.format(&self.timestamp_format)),
            FluteValue::Array(items) => {
                let items: Vec<String> = items.iter().map(|item| self.literal(item)).collect();
                format!("({})", items.join(", "))
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use super::*;

    #[test]
    fn test_embeds_values() {
        let birthdate = FluteValue::Date(NaiveDate::from_ymd_opt(1965, 3, 3).unwrap());
        let name = FluteValue::Text("O'Neil".to_string());
        let sql = "select * from MEMBER where MEMBER_NAME = ? and BIRTHDATE = ? and MEMO = '?' and STATUS = ?";
        let display = DisplaySqlBuilder::new().build(sql, &[&name, &birthdate, &FluteValue::Null]);
        assert_eq!(display, "select * from MEMBER where MEMBER_NAME = 'O''Neil' and BIRTHDATE = '1965-03-03' and MEMO = '?' and STATUS = null");
    }

    #[test]
    fn test_custom_date_format_and_missing_values() {
        let builder = DisplaySqlBuilder::new().set_date_format("%Y/%m/%d");
        let date = FluteValue::Date(NaiveDate::from_ymd_opt(2001, 9, 4).unwrap());
        assert_eq!(builder.build("values (?, ?) -- ? here\n", &[&date]), "values ('2001/09/04', ?) -- ? here\n");
    }
}
