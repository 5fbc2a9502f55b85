//! 标记解析器 - 把 HTML 风格的标记解析为节点列表

use crate::error::ParseError;
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// 不需要闭合标签的空元素
static VOID_ELEMENTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
        "track", "wbr",
    ]
    .into_iter()
    .collect()
});

/// 解析结果节点
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupNode {
    Element {
        tag: String,
        /// 保持书写顺序
        attributes: Vec<(String, String)>,
        children: Vec<MarkupNode>,
    },
    Text(String),
}

impl MarkupNode {
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        match self {
            MarkupNode::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            MarkupNode::Text(_) => None,
        }
    }
}

/// 标记解析器
pub struct MarkupParser {
    input: Vec<char>,
    pos: usize,
}

impl MarkupParser {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    /// 解析整段输入
    pub fn parse(&mut self) -> Result<Vec<MarkupNode>, ParseError> {
        let nodes = self.parse_nodes()?;
        if self.pos < self.input.len() {
            // 顶层出现多余的结束标签
            return Err(ParseError::UnexpectedClosingTag { pos: self.pos });
        }
        Ok(nodes)
    }

    fn parse_nodes(&mut self) -> Result<Vec<MarkupNode>, ParseError> {
        let mut nodes = Vec::new();

        while self.pos < self.input.len() {
            if self.starts_with("<!--") {
                self.parse_comment();
            } else if self.starts_with("<!") {
                // <!DOCTYPE ...>
                self.skip_until('>');
            } else if self.current_char() == '<' {
                if self.starts_with("</") {
                    break; // 结束标签，返回上层
                }
                nodes.push(self.parse_element()?);
            } else if let Some(text) = self.parse_text() {
                nodes.push(text);
            }
        }

        Ok(nodes)
    }

    fn parse_element(&mut self) -> Result<MarkupNode, ParseError> {
        self.expect('<')?;

        let tag = self.parse_tag_name().to_ascii_lowercase();
        if tag.is_empty() {
            return Err(ParseError::EmptyTagName { pos: self.pos });
        }

        let mut attributes: Vec<(String, String)> = Vec::new();

        // 解析属性
        loop {
            self.skip_whitespace();
            if self.pos >= self.input.len() {
                return Err(ParseError::UnexpectedEof { tag });
            }
            if self.current_char() == '>' || self.starts_with("/>") {
                break;
            }

            let (name, value) = self.parse_attribute()?;
            // 重复属性以第一次出现为准
            if !attributes.iter().any(|(key, _)| *key == name) {
                attributes.push((name, value));
            }
        }

        // 自闭合标签
        if self.starts_with("/>") {
            self.advance();
            self.advance();
            return Ok(MarkupNode::Element {
                tag,
                attributes,
                children: Vec::new(),
            });
        }

        self.expect('>')?;

        if VOID_ELEMENTS.contains(tag.as_str()) {
            return Ok(MarkupNode::Element {
                tag,
                attributes,
                children: Vec::new(),
            });
        }

        // 解析子节点
        let children = self.parse_nodes()?;

        // 解析结束标签
        if self.starts_with("</") {
            self.advance();
            self.advance();
            let end_tag = self.parse_tag_name().to_ascii_lowercase();
            if end_tag != tag {
                return Err(ParseError::MismatchedTag {
                    expected: tag,
                    found: end_tag,
                });
            }
            self.skip_whitespace();
            self.expect('>')?;
        } else {
            return Err(ParseError::UnexpectedEof { tag });
        }

        Ok(MarkupNode::Element {
            tag,
            attributes,
            children,
        })
    }

    fn parse_tag_name(&mut self) -> String {
        let mut name = String::new();
        while self.pos < self.input.len() {
            let c = self.current_char();
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        name
    }

    fn parse_attribute(&mut self) -> Result<(String, String), ParseError> {
        let name = self.parse_attribute_name();
        if name.is_empty() {
            return Err(ParseError::Expected {
                expected: "attribute name".to_string(),
                found: self.current_char(),
            });
        }

        self.skip_whitespace();

        if self.current_char() != '=' {
            return Ok((name, String::new()));
        }

        self.advance(); // skip '='
        self.skip_whitespace();

        let value = self.parse_attribute_value();

        Ok((name, decode_entities(&value)))
    }

    fn parse_attribute_name(&mut self) -> String {
        let mut name = String::new();
        while self.pos < self.input.len() {
            let c = self.current_char();
            if c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.' | '@') {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        name
    }

    fn parse_attribute_value(&mut self) -> String {
        let quote = self.current_char();
        if quote != '"' && quote != '\'' {
            // 无引号值
            let mut value = String::new();
            while self.pos < self.input.len() {
                let c = self.current_char();
                if c.is_whitespace() || c == '>' || self.starts_with("/>") {
                    break;
                }
                value.push(c);
                self.advance();
            }
            return value;
        }

        self.advance(); // skip opening quote

        let mut value = String::new();
        while self.pos < self.input.len() && self.current_char() != quote {
            value.push(self.current_char());
            self.advance();
        }

        if self.pos < self.input.len() {
            self.advance(); // skip closing quote
        }

        value
    }

    fn parse_text(&mut self) -> Option<MarkupNode> {
        let mut text = String::new();
        while self.pos < self.input.len() && self.current_char() != '<' {
            text.push(self.current_char());
            self.advance();
        }

        // 纯空白文本丢弃
        if text.trim().is_empty() {
            None
        } else {
            Some(MarkupNode::Text(decode_entities(&text)))
        }
    }

    fn parse_comment(&mut self) {
        // Skip <!--
        for _ in 0..4 {
            self.advance();
        }

        while self.pos < self.input.len() && !self.starts_with("-->") {
            self.advance();
        }

        // Skip -->
        for _ in 0..3 {
            if self.pos < self.input.len() {
                self.advance();
            }
        }
    }

    fn skip_until(&mut self, c: char) {
        while self.pos < self.input.len() && self.current_char() != c {
            self.advance();
        }
        if self.pos < self.input.len() {
            self.advance();
        }
    }

    fn current_char(&self) -> char {
        self.input.get(self.pos).copied().unwrap_or('\0')
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.input.get(self.pos + i) == Some(&c))
    }

    fn expect(&mut self, c: char) -> Result<(), ParseError> {
        if self.current_char() == c {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::Expected {
                expected: c.to_string(),
                found: self.current_char(),
            })
        }
    }
}

/// 解码常见实体
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

/// 文本转义，用于序列化
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// 属性值转义
pub fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
