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
//! Binary `NUMERIC` and raw text values of the PostgreSQL wire format.
//!

use std::error::Error;
use std::fmt::Write;
use std::str::FromStr;
use bigdecimal::BigDecimal;
use postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use bytes::BytesMut;

type BoxError = Box<dyn Error + Sync + Send>;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;

/// `NUMERIC` as base-10000 digit groups.
#[derive(Debug, Clone, PartialEq)]
pub struct PgNumeric(pub BigDecimal);

impl PgNumeric {
    fn plain_parts(&self) -> (bool, String, String) {
        let (bigint, scale) = self.0.as_bigint_and_exponent();
        let text = bigint.to_string();
        let negative = text.starts_with('-');
        let digits = text.trim_start_matches('-');
        if scale <= 0 {
            let integer = format!("{}{}", digits, "0".repeat((-scale) as usize));
            return (negative, integer, String::new());
        }
        let scale = scale as usize;
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (integer, fraction) = padded.split_at(padded.len() - scale);
        (negative, integer.to_string(), fraction.to_string())
    }
}

fn groups(digits: &str) -> Vec<i16> {
    digits.as_bytes()
        .chunks(4)
        .map(|chunk| chunk.iter().fold(0i16, |acc, b| acc * 10 + (b - b'0') as i16))
        .collect()
}

impl ToSql for PgNumeric {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        let (negative, integer, fraction) = self.plain_parts();
        let integer = integer.trim_start_matches('0');
        let integer = format!("{}{}", "0".repeat((4 - integer.len() % 4) % 4), integer);
        let dscale = fraction.len();
        let fraction = format!("{}{}", fraction, "0".repeat((4 - dscale % 4) % 4));

        let integer_groups = groups(&integer);
        let mut weight = integer_groups.len() as i16 - 1;
        let mut digits = integer_groups;
        digits.extend(groups(&fraction));
        while digits.first() == Some(&0) {
            digits.remove(0);
            weight -= 1;
        }
        while digits.last() == Some(&0) {
            digits.pop();
        }
        if digits.is_empty() {
            weight = 0;
        }
        let sign = if negative && !digits.is_empty() { NUMERIC_NEG } else { NUMERIC_POS };

        out.extend_from_slice(&(digits.len() as i16).to_be_bytes());
        out.extend_from_slice(&weight.to_be_bytes());
        out.extend_from_slice(&sign.to_be_bytes());
        out.extend_from_slice(&(dscale as u16).to_be_bytes());
        for digit in digits {
            out.extend_from_slice(&digit.to_be_bytes());
        }
        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }

    to_sql_checked!();
}

fn read_u16(raw: &[u8], at: usize) -> Result<u16, BoxError> {
    raw.get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| "Truncated numeric value".into())
}

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let ndigits = read_u16(raw, 0)? as usize;
        let weight = read_u16(raw, 2)? as i16 as i32;
        let sign = read_u16(raw, 4)?;
        let dscale = read_u16(raw, 6)? as usize;
        if sign == NUMERIC_NAN {
            return Err("NaN is not a decimal".into());
        }
        let mut digits = Vec::with_capacity(ndigits);
        for i in 0..ndigits {
            digits.push(read_u16(raw, 8 + i * 2)?);
        }
        let digit = |k: i32| if k < 0 { 0 } else { digits.get(k as usize).copied().unwrap_or(0) };

        let mut text = String::new();
        if sign == NUMERIC_NEG {
            text.push('-');
        }
        if weight < 0 {
            text.push('0');
        } else {
            for k in 0..=weight {
                if k == 0 {
                    write!(text, "{}", digit(k))?;
                } else {
                    write!(text, "{:04}", digit(k))?;
                }
            }
        }
        if dscale > 0 {
            let mut fraction = String::new();
            let mut k = weight + 1;
            while fraction.len() < dscale {
                write!(fraction, "{:04}", digit(k))?;
                k += 1;
            }
            fraction.truncate(dscale);
            text.push('.');
            text.push_str(&fraction);
        }
        Ok(PgNumeric(BigDecimal::from_str(&text)?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Raw text of types sent as text on the wire: `refcursor`, `xml` and enums.
#[derive(Debug, Clone, PartialEq)]
pub struct RawText(pub String);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(RawText(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}
