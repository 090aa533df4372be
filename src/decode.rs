use base64::{
    alphabet,
    engine::{general_purpose::STANDARD, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};

use crate::{
    wire::{self, NamedArg, Stmt},
    BatchResults, Column, HranaError, Statement, StatementResult, Value,
};

/// Accepts base64 with or without trailing padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub(crate) fn build_stmt(statement: &Statement) -> Result<Stmt, HranaError> {
    let args = statement
        .params
        .positional
        .iter()
        .map(encode_value)
        .collect::<Result<Vec<_>, _>>()?;

    let named_args = statement
        .params
        .named
        .iter()
        .map(|(name, value)| {
            if name.is_empty() {
                return Err(HranaError::InvalidArgument(
                    "named parameter name cannot be empty".to_owned(),
                ));
            }
            Ok(NamedArg {
                name: name.clone(),
                value: encode_value(value)?,
            })
        })
        .collect::<Result<Vec<_>, HranaError>>()?;

    Ok(Stmt {
        sql: statement.sql.clone(),
        args: (!args.is_empty()).then_some(args),
        named_args: (!named_args.is_empty()).then_some(named_args),
        want_rows: statement.want_rows,
    })
}

pub(crate) fn encode_value(value: &Value) -> Result<wire::Value, HranaError> {
    match value {
        Value::Null => Ok(wire::Value::Null {}),
        Value::Integer(value) => Ok(wire::Value::Integer {
            value: value.to_string(),
        }),
        Value::Float(value) => {
            if !value.is_finite() {
                return Err(HranaError::InvalidArgument(format!(
                    "non-finite float value '{value}' is unsupported"
                )));
            }
            Ok(wire::Value::Float { value: *value })
        }
        Value::Text(value) => Ok(wire::Value::Text {
            value: value.clone(),
        }),
        Value::Blob(bytes) => Ok(wire::Value::Blob {
            base64: STANDARD.encode(bytes),
        }),
    }
}

pub(crate) fn decode_value(value: wire::Value) -> Result<Value, HranaError> {
    match value {
        wire::Value::Null {} => Ok(Value::Null),
        wire::Value::Integer { value } => value
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|err| HranaError::Decode(format!("invalid integer value '{value}': {err}"))),
        wire::Value::Float { value } => Ok(Value::Float(value)),
        wire::Value::Text { value } => Ok(Value::Text(value)),
        wire::Value::Blob { base64 } => LENIENT_BASE64
            .decode(base64.as_bytes())
            .map(Value::Blob)
            .map_err(|err| HranaError::Decode(format!("invalid base64 blob: {err}"))),
    }
}

pub(crate) fn decode_statement_result(
    result: wire::StmtResult,
) -> Result<StatementResult, HranaError> {
    let columns: Vec<Column> = result
        .cols
        .into_iter()
        .map(|col| Column {
            name: col.name,
            decltype: col.decltype,
        })
        .collect();

    let rows = result
        .rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            if row.len() != columns.len() {
                return Err(HranaError::Decode(format!(
                    "row {index} has {} values for {} columns",
                    row.len(),
                    columns.len()
                )));
            }
            row.into_iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, HranaError>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StatementResult {
        columns,
        rows,
        affected_row_count: result.affected_row_count,
        last_insert_rowid: result.last_insert_rowid,
    })
}

pub(crate) fn decode_batch_result(result: wire::BatchResult) -> Result<BatchResults, HranaError> {
    if result.step_results.len() != result.step_errors.len() {
        return Err(HranaError::Decode(format!(
            "batch result has {} step results but {} step errors",
            result.step_results.len(),
            result.step_errors.len()
        )));
    }

    let step_results = result
        .step_results
        .into_iter()
        .map(|step| step.map(decode_statement_result).transpose())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BatchResults {
        step_results,
        step_errors: result.step_errors,
    })
}
