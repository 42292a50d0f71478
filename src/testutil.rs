//! In-memory OOXML fixtures for unit tests.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const S_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

pub fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in files {
        zout.start_file(*name, opts).expect("start entry");
        zout.write_all(data).expect("write entry");
    }
    zout.finish().expect("finish zip").into_inner()
}

pub fn read_entry(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut zip = ZipArchive::new(Cursor::new(bytes)).expect("open zip");
    let mut file = zip.by_name(name).expect("entry present");
    let mut out = Vec::new();
    file.read_to_end(&mut out).expect("read entry");
    out
}

/// `word/document.xml` with `body` placed inside `<w:body>`.
pub fn docx_document(body: &str) -> String {
    format!(r#"{DECL}<w:document xmlns:w="{W_NS}"><w:body>{body}</w:body></w:document>"#)
}

/// Header, footer or notes part with root element `w:{root}`.
pub fn docx_hdr_ftr(root: &str, body: &str) -> String {
    format!(r#"{DECL}<w:{root} xmlns:w="{W_NS}">{body}</w:{root}>"#)
}

pub fn minimal_docx(document_xml: &str, extra: &[(&str, String)]) -> Vec<u8> {
    let content_types = format!(
        r#"{DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#
    );
    let root_rels = format!(
        r#"{DECL}<Relationships xmlns="{PKG_RELS_NS}"><Relationship Id="rId1" Type="{R_NS}/officeDocument" Target="word/document.xml"/></Relationships>"#
    );
    let styles = format!(r#"{DECL}<w:styles xmlns:w="{W_NS}"><w:style w:styleId="Normal"/></w:styles>"#);

    let mut files: Vec<(&str, &[u8])> = vec![
        ("[Content_Types].xml", content_types.as_bytes()),
        ("_rels/.rels", root_rels.as_bytes()),
        ("word/document.xml", document_xml.as_bytes()),
        ("word/styles.xml", styles.as_bytes()),
    ];
    for (name, data) in extra {
        files.push((*name, data.as_bytes()));
    }
    build_zip(&files)
}

/// Worksheet with `rows` placed inside `<sheetData>`.
pub fn xlsx_sheet(rows: &str) -> String {
    format!(r#"{DECL}<worksheet xmlns="{S_NS}" xmlns:r="{R_NS}"><sheetData>{rows}</sheetData></worksheet>"#)
}

/// Shared-string table from raw `<si>` inner markup.
pub fn xlsx_shared_strings(items: &[&str]) -> String {
    let body: String = items.iter().map(|i| format!("<si>{i}</si>")).collect();
    format!(
        r#"{DECL}<sst xmlns="{S_NS}" count="{n}" uniqueCount="{n}">{body}</sst>"#,
        n = items.len()
    )
}

/// Workbook whose sheets are stored as `xl/worksheets/sheet{n}.xml`.
pub fn minimal_xlsx(sheets: &[(&str, String)], shared_strings: Option<String>) -> Vec<u8> {
    let mut sheet_entries = String::new();
    let mut rel_entries = String::new();
    for (i, (name, _)) in sheets.iter().enumerate() {
        let n = i + 1;
        sheet_entries.push_str(&format!(r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#));
        rel_entries.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="{R_NS}/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));
    }
    if shared_strings.is_some() {
        rel_entries.push_str(&format!(
            r#"<Relationship Id="rIdSst" Type="{R_NS}/sharedStrings" Target="sharedStrings.xml"/>"#
        ));
    }
    let workbook = format!(
        r#"{DECL}<workbook xmlns="{S_NS}" xmlns:r="{R_NS}"><sheets>{sheet_entries}</sheets></workbook>"#
    );
    let workbook_rels = format!(r#"{DECL}<Relationships xmlns="{PKG_RELS_NS}">{rel_entries}</Relationships>"#);
    let styles = format!(r#"{DECL}<styleSheet xmlns="{S_NS}"><numFmts count="0"/></styleSheet>"#);

    let sheet_paths: Vec<String> = (1..=sheets.len())
        .map(|n| format!("xl/worksheets/sheet{n}.xml"))
        .collect();
    let mut files: Vec<(&str, &[u8])> = vec![
        ("xl/workbook.xml", workbook.as_bytes()),
        ("xl/_rels/workbook.xml.rels", workbook_rels.as_bytes()),
        ("xl/styles.xml", styles.as_bytes()),
    ];
    for (path, (_, xml)) in sheet_paths.iter().zip(sheets) {
        files.push((path.as_str(), xml.as_bytes()));
    }
    if let Some(sst) = shared_strings.as_ref() {
        files.push(("xl/sharedStrings.xml", sst.as_bytes()));
    }
    build_zip(&files)
}
