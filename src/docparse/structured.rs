use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use super::sanitize::{clean_text, decode_entities};
use super::TierError;

/// One titled section of a regulatory document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub articles: Vec<Article>,
}

/// One article: a title plus its paragraphs, in authored order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub paragraphs: Vec<String>,
}

/// The section/article/paragraph tree recovered from a well-formed document,
/// plus the root's `title` and `type` attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct DocTree {
    pub title: String,
    pub doc_type: String,
    pub sections: Vec<Section>,
}

enum Elem {
    Root,
    Section,
    Article,
    Paragraph,
    Other,
}

/// Parse a sanitized document into a [`DocTree`], walking root → `SECTION` →
/// `ARTICLE` → `PARAGRAPH` in document order. Paragraph text is the direct
/// text content only (capture stops at the first child element, as the
/// upstream documents nest stray markup there). Empty paragraphs, articles
/// with neither title nor paragraphs, and sections with no articles are
/// dropped. Any parse problem is reported as a [`TierError`] for the caller
/// to route into recovery.
pub fn parse_structured(xml: &str) -> Result<DocTree, TierError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().check_end_names = true;

    let mut stack: Vec<Elem> = Vec::new();
    let mut tree: Option<DocTree> = None;
    let mut cur_section: Option<Section> = None;
    let mut cur_article: Option<Article> = None;
    let mut para_text = String::new();
    let mut para_saw_child = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let elem = if stack.is_empty() {
                    tree = Some(DocTree {
                        title: attr_value(&e, b"title")?,
                        doc_type: attr_value(&e, b"type")?,
                        sections: Vec::new(),
                    });
                    Elem::Root
                } else if in_paragraph(&stack) {
                    para_saw_child = true;
                    Elem::Other
                } else {
                    match (stack.last(), e.name().as_ref()) {
                        (Some(Elem::Root), b"SECTION") => {
                            cur_section = Some(Section {
                                title: attr_value(&e, b"title")?,
                                articles: Vec::new(),
                            });
                            Elem::Section
                        }
                        (Some(Elem::Section), b"ARTICLE") => {
                            cur_article = Some(Article {
                                title: attr_value(&e, b"title")?,
                                paragraphs: Vec::new(),
                            });
                            Elem::Article
                        }
                        (Some(Elem::Article), b"PARAGRAPH") => {
                            para_text.clear();
                            para_saw_child = false;
                            Elem::Paragraph
                        }
                        _ => Elem::Other,
                    }
                };
                stack.push(elem);
            }
            Event::Empty(_) => {
                if in_paragraph(&stack) {
                    para_saw_child = true;
                }
            }
            Event::Text(e) => {
                if in_paragraph(&stack) && !para_saw_child {
                    para_text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::CData(e) => {
                if in_paragraph(&stack) && !para_saw_child {
                    para_text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::GeneralRef(e) => {
                if in_paragraph(&stack) && !para_saw_child {
                    para_text.push('&');
                    para_text.push_str(&String::from_utf8_lossy(&e));
                    para_text.push(';');
                }
            }
            Event::End(_) => match stack.pop() {
                Some(Elem::Paragraph) => {
                    let text = clean_text(&para_text);
                    if !text.is_empty() {
                        if let Some(article) = cur_article.as_mut() {
                            article.paragraphs.push(text);
                        }
                    }
                }
                Some(Elem::Article) => {
                    if let (Some(article), Some(section)) =
                        (cur_article.take(), cur_section.as_mut())
                    {
                        if !article.title.is_empty() || !article.paragraphs.is_empty() {
                            section.articles.push(article);
                        }
                    }
                }
                Some(Elem::Section) => {
                    if let (Some(section), Some(tree)) = (cur_section.take(), tree.as_mut()) {
                        if !section.articles.is_empty() {
                            tree.sections.push(section);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => {
                if !stack.is_empty() {
                    return Err(TierError::Unterminated);
                }
                break;
            }
            _ => {}
        }
    }

    tree.ok_or(TierError::NoRoot)
}

fn in_paragraph(stack: &[Elem]) -> bool {
    stack.iter().any(|e| matches!(e, Elem::Paragraph))
}

fn attr_value(
    e: &quick_xml::events::BytesStart,
    key: &[u8],
) -> Result<String, TierError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(decode_entities(&String::from_utf8_lossy(&attr.value)));
        }
    }
    Ok(String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docparse::sanitize::sanitize;

    #[test]
    fn wellformed_document() {
        let xml = r#"<DOC title="효능효과" type="EE"><SECTION title=""><ARTICLE title="효능효과"><PARAGRAPH>두통, 치통의 완화</PARAGRAPH><PARAGRAPH>발열</PARAGRAPH></ARTICLE></SECTION></DOC>"#;
        let tree = parse_structured(xml).unwrap();
        assert_eq!(tree.title, "효능효과");
        assert_eq!(tree.doc_type, "EE");
        assert_eq!(tree.sections.len(), 1);
        assert_eq!(tree.sections[0].articles[0].paragraphs.len(), 2);
        assert_eq!(tree.sections[0].articles[0].paragraphs[0], "두통, 치통의 완화");
    }

    #[test]
    fn cdata_paragraph() {
        let xml = r#"<DOC title="T"><SECTION><ARTICLE title="A"><PARAGRAPH><![CDATA[1일 3회 복용]]></PARAGRAPH></ARTICLE></SECTION></DOC>"#;
        let tree = parse_structured(xml).unwrap();
        assert_eq!(tree.sections[0].articles[0].paragraphs[0], "1일 3회 복용");
    }

    #[test]
    fn escaped_entities_decoded() {
        let xml = sanitize(r#"<DOC title="T"><SECTION><ARTICLE title="A"><PARAGRAPH>A &amp; B</PARAGRAPH></ARTICLE></SECTION></DOC>"#);
        let tree = parse_structured(&xml).unwrap();
        assert_eq!(tree.sections[0].articles[0].paragraphs[0], "A & B");
    }

    #[test]
    fn direct_text_only() {
        // Text after a nested child element is not part of the paragraph.
        let xml = r#"<DOC title="T"><SECTION><ARTICLE title="A"><PARAGRAPH>before<NOTE>inner</NOTE>after</PARAGRAPH></ARTICLE></SECTION></DOC>"#;
        let tree = parse_structured(xml).unwrap();
        assert_eq!(tree.sections[0].articles[0].paragraphs, vec!["before"]);
    }

    #[test]
    fn empty_article_dropped() {
        let xml = r#"<DOC title="T"><SECTION title="S"><ARTICLE title=""><PARAGRAPH>  </PARAGRAPH></ARTICLE><ARTICLE title="B"><PARAGRAPH>내용</PARAGRAPH></ARTICLE></SECTION></DOC>"#;
        let tree = parse_structured(xml).unwrap();
        assert_eq!(tree.sections[0].articles.len(), 1);
        assert_eq!(tree.sections[0].articles[0].title, "B");
    }

    #[test]
    fn empty_section_dropped() {
        let xml = r#"<DOC title="T"><SECTION title="S1"/><SECTION title="S2"><ARTICLE title="A"><PARAGRAPH>x y z</PARAGRAPH></ARTICLE></SECTION></DOC>"#;
        let tree = parse_structured(xml).unwrap();
        assert_eq!(tree.sections.len(), 1);
        assert_eq!(tree.sections[0].title, "S2");
    }

    #[test]
    fn section_order_preserved() {
        let xml = r#"<DOC title="T"><SECTION title="S1"><ARTICLE title="A1"><PARAGRAPH>first</PARAGRAPH></ARTICLE><ARTICLE title="A2"><PARAGRAPH>second</PARAGRAPH></ARTICLE></SECTION><SECTION title="S2"><ARTICLE title="B1"><PARAGRAPH>third</PARAGRAPH></ARTICLE></SECTION></DOC>"#;
        let tree = parse_structured(xml).unwrap();
        let articles: Vec<&str> = tree
            .sections
            .iter()
            .flat_map(|s| &s.articles)
            .map(|a| a.title.as_str())
            .collect();
        assert_eq!(articles, vec!["A1", "A2", "B1"]);
    }

    #[test]
    fn unterminated_tag_is_a_parse_error() {
        let xml = r#"<DOC title="T"><SECTION><ARTICLE title="B"><PARAGRAPH>cut off"#;
        assert!(parse_structured(xml).is_err());
    }

    #[test]
    fn mismatched_end_tag_is_a_parse_error() {
        let xml = r#"<DOC><SECTION></ARTICLE></SECTION></DOC>"#;
        assert!(parse_structured(xml).is_err());
    }

    #[test]
    fn plain_prose_has_no_root() {
        assert!(matches!(
            parse_structured("그냥 설명 문장입니다"),
            Err(TierError::NoRoot)
        ));
    }
}
