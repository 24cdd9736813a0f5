//! CSV -> 数据框摘要
//!
//! 读取表头、行数、数值列统计（count / mean / min / max）与前几行，拼成 dataframe 提示片段。

use std::path::Path;

use async_trait::async_trait;

use crate::files::FileHandler;

const PREVIEW_ROWS: usize = 5;

pub const DATAFRAME_PROMPT: &str = "provide a dataframe named {filename}. The description is: {description}.\n\n\
You are able to use the dataframe to answer the question.\n\
You have to act like a data analyst who can do an effective analysis through the dataframe.\n";

#[derive(Debug, Default)]
struct NumericStats {
    count: usize,
    sum: f64,
    min: f64,
    max: f64,
}

impl NumericStats {
    fn add(&mut self, v: f64) {
        if self.count == 0 {
            self.min = v;
            self.max = v;
        } else {
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
        self.count += 1;
        self.sum += v;
    }
}

fn read_csv(content: &str) -> Result<(Vec<String>, Vec<Vec<String>>), String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let header: Vec<String> = reader
        .headers()
        .map_err(|e| format!("Invalid CSV header: {}", e))?
        .iter()
        .map(str::to_string)
        .collect();
    if header.iter().all(|h| h.is_empty()) {
        return Err("CSV file is empty".to_string());
    }
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| format!("Invalid CSV row: {}", e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok((header, rows))
}

/// 生成 CSV 描述文本
pub fn describe_csv(content: &str) -> Result<String, String> {
    let (header, rows) = read_csv(content)?;

    // None 表示该列出现过非数值
    let mut stats: Vec<Option<NumericStats>> =
        header.iter().map(|_| Some(NumericStats::default())).collect();
    for row in &rows {
        for (i, slot) in stats.iter_mut().enumerate() {
            let Some(cell) = row.get(i).filter(|c| !c.is_empty()) else {
                continue;
            };
            match (slot.as_mut(), cell.parse::<f64>()) {
                (Some(s), Ok(v)) => s.add(v),
                (Some(_), Err(_)) => *slot = None,
                (None, _) => {}
            }
        }
    }

    let mut out = format!(
        "{} rows x {} columns. Columns: {}.",
        rows.len(),
        header.len(),
        header.join(", ")
    );
    for (name, s) in header.iter().zip(&stats) {
        if let Some(s) = s.as_ref().filter(|s| s.count > 0) {
            out.push_str(&format!(
                " {}: count={}, mean={:.3}, min={}, max={}.",
                name,
                s.count,
                s.sum / s.count as f64,
                s.min,
                s.max
            ));
        }
    }
    if !rows.is_empty() {
        out.push_str(" First rows: ");
        let preview: Vec<String> = rows
            .iter()
            .take(PREVIEW_ROWS)
            .map(|r| format!("[{}]", r.join(", ")))
            .collect();
        out.push_str(&preview.join(" "));
    }
    Ok(out)
}

/// CSV 文件处理器（本地计算，无外部依赖）
#[derive(Debug, Default)]
pub struct CsvToDataframe;

#[async_trait]
impl FileHandler for CsvToDataframe {
    async fn handle(&self, name: &str, path: &Path) -> Result<String, String> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let description = describe_csv(&content)?;
        Ok(DATAFRAME_PROMPT
            .replace("{filename}", name)
            .replace("{description}", &description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_fields_keep_commas_quotes_and_newlines() {
        let csv = "name,note,price\n\"merlot\",\"dry, red\nsmooth\",10\nrioja,\"say \"\"hi\"\"\",20\n";
        let d = describe_csv(csv).unwrap();
        assert!(d.starts_with("2 rows x 3 columns. Columns: name, note, price."));
        assert!(d.contains("price: count=2, mean=15.000, min=10, max=20."));
        assert!(d.contains("[merlot, dry, red\nsmooth, 10]"));
        assert!(d.contains(r#"[rioja, say "hi", 20]"#));
    }

    #[test]
    fn describes_numeric_and_text_columns() {
        let csv = "name,price,qty\nmerlot,10,1\nrioja,20,x\n";
        let d = describe_csv(csv).unwrap();
        assert!(d.starts_with("2 rows x 3 columns. Columns: name, price, qty."));
        assert!(d.contains("price: count=2, mean=15.000, min=10, max=20."));
        assert!(!d.contains("qty: count"));
        assert!(!d.contains("name: count"));
        assert!(d.contains("[merlot, 10, 1]"));
        assert!(describe_csv("").is_err());
    }

    #[tokio::test]
    async fn handler_formats_prompt_and_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wines.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let first = CsvToDataframe.handle("dataframe/wines.csv", &path).await.unwrap();
        let second = CsvToDataframe.handle("dataframe/wines.csv", &path).await.unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("provide a dataframe named dataframe/wines.csv."));
    }
}
