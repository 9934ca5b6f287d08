// ==========================================
// CRM 销售管道系统 - CSV 解析器
// ==========================================
// 格式: 首行为表头；引号转义遵循 RFC4180（由 csv crate 处理）
// 宽松模式: 列数不一致的行跳过并记录；严格模式: 直接报错
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use csv::ReaderBuilder;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// 原始行：表头 → 单元格文本（已 trim）
pub type RawRow = HashMap<String, String>;

/// 被跳过的行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub line: u64, // 源文件行号（1 起，含表头行）
    pub reason: String,
}

/// 解析结果
#[derive(Debug, Clone, Default)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    pub skipped: Vec<SkippedRow>,
}

impl ParsedCsv {
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }
}

// ==========================================
// CsvParser
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvParser {
    strict_columns: bool,
}

impl CsvParser {
    pub fn new(strict_columns: bool) -> Self {
        Self { strict_columns }
    }

    pub fn lenient() -> Self {
        Self::new(false)
    }

    pub fn strict() -> Self {
        Self::new(true)
    }

    /// 解析 CSV 文本
    pub fn parse_str(&self, text: &str) -> ImportResult<ParsedCsv> {
        self.parse_reader(text.as_bytes())
    }

    /// 解析 CSV 文件
    ///
    /// # 返回
    /// - Err(FileNotFound): 文件不存在
    pub fn parse_file(&self, path: &Path) -> ImportResult<ParsedCsv> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        let file = File::open(path)?;
        self.parse_reader(file)
    }

    fn parse_reader<R: Read>(&self, reader: R) -> ImportResult<ParsedCsv> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 列数校验自行处理
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut parsed = ParsedCsv {
            headers,
            ..ParsedCsv::default()
        };
        if parsed.headers.iter().all(|h| h.is_empty()) {
            return Ok(parsed);
        }

        let expected = parsed.headers.len();
        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    if self.strict_columns {
                        return Err(e.into());
                    }
                    warn!(line, error = %e, "CSV 行解析失败，已跳过");
                    parsed.skipped.push(SkippedRow {
                        line,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let line = record.position().map(|p| p.line()).unwrap_or(0);

            // 跳过完全空白的行
            if record.iter().all(|v| v.trim().is_empty()) {
                continue;
            }

            if record.len() != expected {
                if self.strict_columns {
                    return Err(ImportError::ColumnCountMismatch {
                        line,
                        expected,
                        actual: record.len(),
                    });
                }
                warn!(line, expected, actual = record.len(), "列数与表头不一致，已跳过");
                parsed.skipped.push(SkippedRow {
                    line,
                    reason: format!("期望 {} 列，实际 {} 列", expected, record.len()),
                });
                continue;
            }

            let row: RawRow = parsed
                .headers
                .iter()
                .zip(record.iter())
                .filter(|(header, _)| !header.is_empty())
                .map(|(header, value)| (header.clone(), value.trim().to_string()))
                .collect();
            parsed.rows.push(row);
        }

        debug!(
            rows = parsed.rows.len(),
            skipped = parsed.skipped.len(),
            "CSV 解析完成"
        );
        Ok(parsed)
    }
}
