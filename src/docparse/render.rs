use super::structured::Section;

/// Render a section/article/paragraph tree to display text. Shared by the
/// structured and tag-repair tiers: the document title framed as 【…】, each
/// article title on its own line as ■ …, and each paragraph as a - bullet,
/// all in authored order.
pub fn render_tree(title: &str, sections: &[Section]) -> String {
    let mut parts = Vec::new();
    if !title.is_empty() {
        parts.push(format!("【{}】", title));
    }
    for section in sections {
        for article in &section.articles {
            if !article.title.is_empty() {
                parts.push(format!("\n■ {}", article.title));
            }
            for paragraph in &article.paragraphs {
                parts.push(format!("- {}", paragraph));
            }
        }
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docparse::structured::Article;

    fn section(title: &str, articles: Vec<Article>) -> Section {
        Section {
            title: title.to_string(),
            articles,
        }
    }

    fn article(title: &str, paragraphs: &[&str]) -> Article {
        Article {
            title: title.to_string(),
            paragraphs: paragraphs.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn title_article_paragraph_framing() {
        let sections = vec![section("", vec![article("A", &["hello & world"])])];
        assert_eq!(
            render_tree("T", &sections),
            "【T】\n\n■ A\n- hello & world"
        );
    }

    #[test]
    fn untitled_article_keeps_paragraphs() {
        let sections = vec![section("S", vec![article("", &["첫째", "둘째"])])];
        assert_eq!(render_tree("T", &sections), "【T】\n- 첫째\n- 둘째");
    }

    #[test]
    fn sections_render_in_order() {
        let sections = vec![
            section("S1", vec![article("A1", &["p1"]), article("A2", &["p2"])]),
            section("S2", vec![article("B1", &["p3"])]),
        ];
        let text = render_tree("T", &sections);
        let a1 = text.find("■ A1").unwrap();
        let a2 = text.find("■ A2").unwrap();
        let b1 = text.find("■ B1").unwrap();
        assert!(a1 < a2 && a2 < b1);
        assert!(text.find("- p1").unwrap() < a2);
        assert!(text.find("- p2").unwrap() < b1);
    }

    #[test]
    fn empty_everything_is_empty_text() {
        assert_eq!(render_tree("", &[]), "");
    }
}
