#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Five shifts over four days, one of them crossing midnight.
pub const MOCK_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    "<people>",
    r#"  <person full_name="h.simpson">"#,
    "    <start>01-01-2020 10:00:00</start>",
    "    <end>01-01-2020 19:00:00</end>",
    "  </person>",
    r#"  <person full_name="d.vader">"#,
    "    <start>01-01-2020 11:00:00</start>",
    "    <end>01-01-2020 17:00:00</end>",
    "  </person>",
    r#"  <person full_name="h.simpson">"#,
    "    <start>02-01-2020 10:00:00</start>",
    "    <end>02-01-2020 18:00:00</end>",
    "  </person>",
    r#"  <person full_name="h.simpson">"#,
    "    <start>03-01-2020 10:00:00</start>",
    "    <end>03-01-2020 19:00:00</end>",
    "  </person>",
    r#"  <person full_name="h.simpson">"#,
    "    <start>04-01-2020 20:00:00</start>",
    "    <end>05-01-2020 02:00:00</end>",
    "  </person>",
    "</people>",
);

pub fn create_test_xml(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Document of `records` one-hour shifts spread over `days` consecutive
/// days of January 2020, cycling through `people` names.
pub fn uniform_xml(records: usize, days: usize, people: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<people>\n");
    for i in 0..records {
        let day = i % days.max(1) + 1;
        xml.push_str(&format!(
            "  <person full_name=\"worker{}\">\n    <start>{:02}-01-2020 09:00:00</start>\n    <end>{:02}-01-2020 10:00:00</end>\n  </person>\n",
            i % people.max(1),
            day,
            day
        ));
    }
    xml.push_str("</people>\n");
    xml
}
