use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use tracing::info;

use super::layout::{DrawOp, FinishedReport, Page};
use super::metrics::FontWeight;
use crate::error::{FlowError, Result};

const POINTS_PER_MM: f32 = 72.0 / 25.4;

fn font_resource(weight: FontWeight) -> Object {
    match weight {
        FontWeight::Regular => Object::Name(b"F1".to_vec()),
        FontWeight::Bold => Object::Name(b"F2".to_vec()),
    }
}

/// Map text onto WinAnsiEncoding; anything outside it becomes `?`.
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '€' => 0x80,
            _ => b'?',
        })
        .collect()
}

fn page_operations(page: &Page, page_height: f32) -> Vec<Operation> {
    let pt = |mm: f32| Object::Real(mm * POINTS_PER_MM);
    let flip = |y: f32| Object::Real((page_height - y) * POINTS_PER_MM);
    let mut operations = Vec::new();

    for op in &page.ops {
        match op {
            DrawOp::Text {
                x,
                y,
                text,
                size,
                weight,
                grey,
            } => {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new(
                    "Tf",
                    vec![font_resource(*weight), Object::Real(*size)],
                ));
                operations.push(Operation::new("g", vec![Object::Real(*grey as f32 / 255.0)]));
                operations.push(Operation::new(
                    "Tm",
                    vec![
                        Object::Integer(1),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(1),
                        pt(*x),
                        flip(*y),
                    ],
                ));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(win_ansi(text))],
                ));
                operations.push(Operation::new("ET", vec![]));
            }
            DrawOp::Rule { x1, x2, y, width } => {
                operations.push(Operation::new("w", vec![pt(*width)]));
                operations.push(Operation::new("G", vec![Object::Integer(0)]));
                operations.push(Operation::new("m", vec![pt(*x1), flip(*y)]));
                operations.push(Operation::new("l", vec![pt(*x2), flip(*y)]));
                operations.push(Operation::new("S", vec![]));
            }
        }
    }
    operations
}

fn base_font(name: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => name,
        "Encoding" => "WinAnsiEncoding",
    }
}

pub fn write_pdf(report: &FinishedReport) -> Result<Vec<u8>> {
    let style = &report.style;
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(base_font("Helvetica"));
    let bold_id = doc.add_object(base_font("Helvetica-Bold"));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids = Vec::with_capacity(report.pages.len());
    for page in &report.pages {
        let content = Content {
            operations: page_operations(page, style.page_height),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(style.page_width * POINTS_PER_MM),
                Object::Real(style.page_height * POINTS_PER_MM),
            ],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(win_ansi(&format!("GDC Compliance Report: {}", report.program_name))),
        "Producer" => Object::string_literal(win_ansi(&style.brand)),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| FlowError::PdfRender(e.to_string()))?;
    info!(pages = page_count, bytes = bytes.len(), program = %report.program_name, "Rendered PDF");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_win_ansi() {
        assert_eq!(win_ansi("a©b•"), vec![b'a', 0xa9, b'b', 0x95]);
        assert_eq!(win_ansi("日"), vec![b'?']);
        assert_eq!(win_ansi("“quoted”"), [vec![0x93], b"quoted".to_vec(), vec![0x94]].concat());
    }

    #[test]
    fn text_is_placed_from_the_bottom_left() {
        let page = Page {
            ops: vec![DrawOp::Text {
                x: 25.4,
                y: 287.0,
                text: "x".to_string(),
                size: 10.0,
                weight: FontWeight::Bold,
                grey: 0,
            }],
        };
        let operations = page_operations(&page, 297.0);
        let tm = operations.iter().find(|op| op.operator == "Tm").unwrap();
        assert!((tm.operands[4].as_float().unwrap() - 72.0).abs() < 1e-3);
        assert!((tm.operands[5].as_float().unwrap() - 10.0 * POINTS_PER_MM).abs() < 1e-3);

        let tf = operations.iter().find(|op| op.operator == "Tf").unwrap();
        assert!(matches!(&tf.operands[0], Object::Name(name) if name.as_slice() == b"F2"));
    }
}
