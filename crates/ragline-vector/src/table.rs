//! LanceDB connection and column access helpers.

use anyhow::Result;
use arrow_array::{Array, Float32Array, Int32Array, RecordBatch, StringArray};
use lancedb::{connect, Connection};

use ragline_core::error::Error;

pub async fn open_db(uri: &str) -> Result<Connection> {
	Ok(connect(uri).execute().await?)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| Error::Operation(format!("column '{}' missing or mistyped", name)).into())
}

pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	column::<StringArray>(batch, name)
}

pub fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
	column::<Int32Array>(batch, name)
}

pub fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float32Array> {
	column::<Float32Array>(batch, name)
}
