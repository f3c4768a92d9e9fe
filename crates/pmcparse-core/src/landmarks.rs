//! Structural landmarks of a PMC article page.
//!
//! Both extraction strategies match the page against the definitions in this
//! module, so a change in the page layout is edited here once.

use crate::model::Reference;

/// An element recognized by tag name plus a set of required class markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Landmark {
    pub tag: &'static str,
    pub classes: &'static [&'static str],
}

impl Landmark {
    /// Whether an element with `tag` and the raw `class` attribute value is
    /// this landmark. All required classes must be present; extra classes
    /// are allowed.
    pub fn matches(&self, tag: &str, class_attr: Option<&str>) -> bool {
        tag == self.tag && self.classes.iter().all(|c| has_class(class_attr, c))
    }

    /// CSS selector form, e.g. `div.contrib-group.fm-author`.
    pub fn selector(&self) -> String {
        let mut sel = self.tag.to_string();
        for class in self.classes {
            sel.push('.');
            sel.push_str(class);
        }
        sel
    }
}

pub const TITLE: Landmark = Landmark {
    tag: "h1",
    classes: &["content-title"],
};

pub const AUTHOR_GROUP: Landmark = Landmark {
    tag: "div",
    classes: &["contrib-group", "fm-author"],
};

/// Each of these inside the author group is one author.
pub const AUTHOR_ELEMENT: &str = "a";

/// Abstract sections are found by heading label, not by class.
pub const ABSTRACT_HEADING: &str = "h2";
pub const ABSTRACT_LABEL: &str = "Abstract";
pub const ABSTRACT_PARAGRAPH: &str = "p";

pub const REFERENCE_CONTAINER: Landmark = Landmark {
    tag: "div",
    classes: &["ref-list-sec", "sec"],
};

/// List-shaped reference container: `ul.back-ref-list li > span`.
pub const REFERENCE_LIST: Landmark = Landmark {
    tag: "ul",
    classes: &["back-ref-list"],
};
pub const REFERENCE_LIST_ITEM: &str = "li";

/// Div-shaped fallback: `div > span`.
pub const GENERIC_ENTRY_PARENT: &str = "div";

/// Element wrapping one reference entry in either shape.
pub const REFERENCE_ENTRY: &str = "span";

pub const REFERENCE_JOURNAL: Landmark = Landmark {
    tag: "span",
    classes: &["ref-journal"],
};

pub const REFERENCE_VOLUME: Landmark = Landmark {
    tag: "span",
    classes: &["ref-vol"],
};

pub const ANCHOR: &str = "a";
pub const PUBMED_LABEL: &str = "PubMed";
pub const FULLTEXT_LABEL: &str = "PMC free article";

/// Inline UI labels rendered after a reference's text.
pub const TRAILING_LABELS: &[&str] = &[" [PubMed]", " [PMC free article]"];

/// Which shape of reference container an entry was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryShape {
    List,
    Generic,
}

/// A dedicated sub-element of a reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryField {
    Journal,
    Volume,
}

impl EntryField {
    pub fn of(tag: &str, class_attr: Option<&str>) -> Option<Self> {
        if REFERENCE_JOURNAL.matches(tag, class_attr) {
            Some(EntryField::Journal)
        } else if REFERENCE_VOLUME.matches(tag, class_attr) {
            Some(EntryField::Volume)
        } else {
            None
        }
    }
}

/// Whether `class` is one of the whitespace-separated tokens of `class_attr`.
pub fn has_class(class_attr: Option<&str>, class: &str) -> bool {
    class_attr.is_some_and(|attr| attr.split_ascii_whitespace().any(|c| c == class))
}

/// Elements at which the search for an abstract paragraph gives up.
pub fn ends_abstract_search(tag: &str, class_attr: Option<&str>) -> bool {
    tag == ABSTRACT_HEADING
        || TITLE.matches(tag, class_attr)
        || AUTHOR_GROUP.matches(tag, class_attr)
        || REFERENCE_CONTAINER.matches(tag, class_attr)
}

/// Remove trailing UI labels, repeatedly and in any order. Whitespace is
/// dropped only where it follows a removed label; nothing else in the text is
/// touched.
pub fn strip_trailing_labels(text: &str) -> &str {
    let mut text = text;
    loop {
        let trimmed = text.trim_end();
        match TRAILING_LABELS
            .iter()
            .find_map(|label| trimmed.strip_suffix(*label))
        {
            Some(rest) => text = rest,
            None => return text,
        }
    }
}

/// Raw pieces of one reference entry, gathered by either strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryParts {
    pub text: String,
    pub journal: Option<String>,
    pub volume: Option<String>,
    /// `(label, href)` of every nested anchor, in document order.
    pub anchors: Vec<(String, Option<String>)>,
}

impl EntryParts {
    pub fn into_reference(self) -> Reference {
        let mut reference = Reference::new(strip_trailing_labels(&self.text));
        reference.journal = self.journal;
        reference.volume = self.volume;
        // Later anchors with the same label overwrite earlier ones.
        for (label, href) in self.anchors {
            match label.trim() {
                PUBMED_LABEL => reference.external_link_pubmed = href,
                FULLTEXT_LABEL => reference.external_link_fulltext = href,
                _ => {}
            }
        }
        reference
    }
}
