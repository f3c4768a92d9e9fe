//! Streaming extraction with an explicit finite-state machine.
//!
//! The machine consumes [`MarkupEvent`]s in document order and never looks
//! back. [`transition`] is the whole rule set: a pure function from the
//! current [`State`], one event and a small [`Context`] to the next state and
//! at most one [`Output`]. [`StreamMachine`] drives it, keeps the stack of
//! every open element, and assembles the [`Paper`].
//!
//! Every landmark state is left only by the CLOSE of the element that
//! entered it. Unmatched CLOSE events are dropped. A CLOSE for an element
//! deeper in the stack closes the elements above it first, so closing an
//! ancestor of a landmark ends the landmark. End tags HTML leaves optional
//! are implied as an HTML parser would: a block element closes an open `p`
//! and an `li` closes the previous `li`. End of input closes everything
//! still open.

use super::{ExtractionResult, PaperExtractor, tokenize};
use crate::ExtractionError;
use crate::landmarks::{self, EntryField, EntryParts, EntryShape};
use crate::model::{Paper, PaperKind, Reference};

/// One event of a linear markup stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupEvent {
    Open {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Close(String),
}

impl MarkupEvent {
    pub fn open(tag: &str, attributes: &[(&str, &str)]) -> Self {
        MarkupEvent::Open {
            tag: tag.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn text(text: &str) -> Self {
        MarkupEvent::Text(text.to_string())
    }

    pub fn close(tag: &str) -> Self {
        MarkupEvent::Close(tag.to_string())
    }
}

fn attr<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Landmarks already consumed. Only the first occurrence of each counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolved {
    pub title: bool,
    pub authors: bool,
    pub abstract_text: bool,
    pub references: bool,
}

/// What the transition table may know about the surroundings of an event.
#[derive(Debug, Clone, Copy, Default)]
pub struct Context<'a> {
    /// Elements open inside the active landmark, the landmark itself
    /// included. Zero outside any landmark.
    pub depth: usize,
    /// Innermost open element inside the active landmark.
    pub parent: Option<&'a str>,
    /// Whether a `ul.back-ref-list` is among the open elements.
    pub in_reference_list: bool,
    pub resolved: Resolved,
}

/// Machine states. Landmark states carry their own text buffers.
#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Idle,
    Title {
        text: String,
    },
    AuthorList,
    AuthorElement {
        /// Depth of the anchor element itself.
        depth: usize,
        text: String,
    },
    AbstractHeading {
        label: String,
    },
    /// An "Abstract" heading was closed; waiting for its paragraph.
    AbstractPending,
    AbstractParagraph {
        text: String,
    },
    ReferenceList,
    ReferenceEntry {
        /// Depth of the entry span itself.
        depth: usize,
        shape: EntryShape,
        entry: EntryBuffer,
    },
}

impl State {
    /// Whether the state is bound to an open landmark element.
    pub fn is_region(&self) -> bool {
        !matches!(self, State::Idle | State::AbstractPending)
    }
}

/// Something the machine learned about the paper.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Title(String),
    Author(String),
    AuthorGroupClosed,
    AbstractHeadingMatched,
    Abstract(String),
    Entry(EntryShape, Reference),
    ReferenceContainerClosed,
}

/// Result of one transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub next: State,
    pub output: Option<Output>,
}

impl Step {
    fn to(next: State) -> Self {
        Self { next, output: None }
    }

    fn emit(next: State, output: Output) -> Self {
        Self {
            next,
            output: Some(output),
        }
    }
}

/// The transition table: current state x event -> next state / output.
pub fn transition(state: State, event: &MarkupEvent, ctx: &Context<'_>) -> Step {
    use MarkupEvent::{Close, Open, Text};

    match (state, event) {
        (State::Idle, Open { tag, attributes }) => {
            Step::to(enter(tag, attr(attributes, "class"), ctx))
        }
        (State::Idle, _) => Step::to(State::Idle),

        (State::Title { mut text }, Text(t)) => {
            text.push_str(t);
            Step::to(State::Title { text })
        }
        (State::Title { text }, Close(_)) if ctx.depth == 1 => {
            Step::emit(State::Idle, Output::Title(text.trim().to_string()))
        }
        (state @ State::Title { .. }, _) => Step::to(state),

        (State::AuthorList, Open { tag, .. }) if tag == landmarks::AUTHOR_ELEMENT => {
            Step::to(State::AuthorElement {
                depth: ctx.depth + 1,
                text: String::new(),
            })
        }
        (State::AuthorList, Close(_)) if ctx.depth == 1 => {
            Step::emit(State::Idle, Output::AuthorGroupClosed)
        }
        (State::AuthorList, _) => Step::to(State::AuthorList),

        (State::AuthorElement { depth, mut text }, Text(t)) => {
            text.push_str(t);
            Step::to(State::AuthorElement { depth, text })
        }
        (State::AuthorElement { depth, text }, Close(_)) if ctx.depth == depth => {
            Step::emit(State::AuthorList, Output::Author(text.trim().to_string()))
        }
        (state @ State::AuthorElement { .. }, _) => Step::to(state),

        (State::AbstractHeading { mut label }, Text(t)) => {
            label.push_str(t);
            Step::to(State::AbstractHeading { label })
        }
        (State::AbstractHeading { label }, Close(_)) if ctx.depth == 1 => {
            if label.trim() == landmarks::ABSTRACT_LABEL {
                Step::emit(State::AbstractPending, Output::AbstractHeadingMatched)
            } else {
                Step::to(State::Idle)
            }
        }
        (state @ State::AbstractHeading { .. }, _) => Step::to(state),

        (State::AbstractPending, Open { tag, .. }) if tag == landmarks::ABSTRACT_PARAGRAPH => {
            Step::to(State::AbstractParagraph {
                text: String::new(),
            })
        }
        (State::AbstractPending, Open { tag, attributes })
            if landmarks::ends_abstract_search(tag, attr(attributes, "class")) =>
        {
            Step::emit(
                enter(tag, attr(attributes, "class"), ctx),
                Output::Abstract(String::new()),
            )
        }
        (State::AbstractPending, _) => Step::to(State::AbstractPending),

        (State::AbstractParagraph { mut text }, Text(t)) => {
            text.push_str(t);
            Step::to(State::AbstractParagraph { text })
        }
        (State::AbstractParagraph { text }, Close(_)) if ctx.depth == 1 => {
            Step::emit(State::Idle, Output::Abstract(text.trim().to_string()))
        }
        (state @ State::AbstractParagraph { .. }, _) => Step::to(state),

        (State::ReferenceList, Open { tag, .. }) if tag == landmarks::REFERENCE_ENTRY => {
            match entry_shape(ctx) {
                Some(shape) => Step::to(State::ReferenceEntry {
                    depth: ctx.depth + 1,
                    shape,
                    entry: EntryBuffer::default(),
                }),
                None => Step::to(State::ReferenceList),
            }
        }
        (State::ReferenceList, Close(_)) if ctx.depth == 1 => {
            Step::emit(State::Idle, Output::ReferenceContainerClosed)
        }
        (State::ReferenceList, _) => Step::to(State::ReferenceList),

        (
            State::ReferenceEntry {
                depth,
                shape,
                entry,
            },
            Close(_),
        ) if ctx.depth == depth => Step::emit(
            State::ReferenceList,
            Output::Entry(shape, entry.finish()),
        ),
        (
            State::ReferenceEntry {
                depth,
                shape,
                mut entry,
            },
            event,
        ) => {
            entry.feed(event);
            Step::to(State::ReferenceEntry {
                depth,
                shape,
                entry,
            })
        }
    }
}

/// The landmark state an OPEN outside any landmark leads to.
fn enter(tag: &str, class_attr: Option<&str>, ctx: &Context<'_>) -> State {
    let resolved = ctx.resolved;
    if !resolved.title && landmarks::TITLE.matches(tag, class_attr) {
        State::Title {
            text: String::new(),
        }
    } else if !resolved.authors && landmarks::AUTHOR_GROUP.matches(tag, class_attr) {
        State::AuthorList
    } else if !resolved.abstract_text && tag == landmarks::ABSTRACT_HEADING {
        State::AbstractHeading {
            label: String::new(),
        }
    } else if !resolved.references && landmarks::REFERENCE_CONTAINER.matches(tag, class_attr) {
        State::ReferenceList
    } else {
        State::Idle
    }
}

/// `ul.back-ref-list li > span` or `div > span`.
fn entry_shape(ctx: &Context<'_>) -> Option<EntryShape> {
    match ctx.parent {
        Some(landmarks::REFERENCE_LIST_ITEM) if ctx.in_reference_list => Some(EntryShape::List),
        Some(landmarks::GENERIC_ENTRY_PARENT) => Some(EntryShape::Generic),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Capture {
    Anchor { label: String, href: Option<String> },
    Field { field: EntryField, text: String },
    Other,
}

/// Text and sub-elements of the reference entry being read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryBuffer {
    parts: EntryParts,
    open: Vec<Capture>,
}

impl EntryBuffer {
    fn feed(&mut self, event: &MarkupEvent) {
        match event {
            MarkupEvent::Open { tag, attributes } => {
                let capture = if tag == landmarks::ANCHOR {
                    Capture::Anchor {
                        label: String::new(),
                        href: attr(attributes, "href").map(str::to_string),
                    }
                } else if let Some(field) = EntryField::of(tag, attr(attributes, "class")) {
                    Capture::Field {
                        field,
                        text: String::new(),
                    }
                } else {
                    Capture::Other
                };
                self.open.push(capture);
            }
            MarkupEvent::Text(t) => {
                self.parts.text.push_str(t);
                for capture in &mut self.open {
                    match capture {
                        Capture::Anchor { label, .. } => label.push_str(t),
                        Capture::Field { text, .. } => text.push_str(t),
                        Capture::Other => {}
                    }
                }
            }
            MarkupEvent::Close(_) => self.close_innermost(),
        }
    }

    fn close_innermost(&mut self) {
        match self.open.pop() {
            Some(Capture::Anchor { label, href }) => self.parts.anchors.push((label, href)),
            Some(Capture::Field { field, text }) => {
                let slot = match field {
                    EntryField::Journal => &mut self.parts.journal,
                    EntryField::Volume => &mut self.parts.volume,
                };
                if slot.is_none() {
                    *slot = Some(text.trim().to_string());
                }
            }
            Some(Capture::Other) | None => {}
        }
    }

    fn finish(mut self) -> Reference {
        while !self.open.is_empty() {
            self.close_innermost();
        }
        self.parts.into_reference()
    }
}

/// Elements whose OPEN closes an open `p`.
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "center", "dd", "details", "dialog", "dir",
    "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hgroup", "hr", "li", "main", "menu", "nav", "ol", "p", "pre",
    "section", "summary", "table", "ul",
];

/// Elements an implied end tag never reaches past.
const SCOPE_BOUNDARIES: &[&str] = &[
    "applet", "button", "caption", "html", "marquee", "object", "table", "td", "template", "th",
];

const LIST_BOUNDARIES: &[&str] = &["ol", "ul"];

#[derive(Debug)]
struct Frame {
    tag: String,
    reference_list: bool,
}

/// Drives [`transition`] over an event stream and accumulates the paper.
#[derive(Debug)]
pub struct StreamMachine {
    state: State,
    frames: Vec<Frame>,
    /// Index in `frames` of the element that entered the active landmark.
    region_start: Option<usize>,
    resolved: Resolved,
    paper: Paper,
    title: Option<String>,
    listed: Vec<Reference>,
    generic: Vec<Reference>,
}

impl Default for StreamMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamMachine {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            frames: Vec::new(),
            region_start: None,
            resolved: Resolved::default(),
            paper: Paper::new(PaperKind::Generic),
            title: None,
            listed: Vec::new(),
            generic: Vec::new(),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn feed(&mut self, event: MarkupEvent) {
        match &event {
            MarkupEvent::Open { tag, attributes } => {
                self.imply_end_tags(tag);
                let reference_list =
                    landmarks::REFERENCE_LIST.matches(tag, attr(attributes, "class"));
                let was_region = self.state.is_region();
                self.step(&event);
                if !was_region && self.state.is_region() {
                    self.region_start = Some(self.frames.len());
                }
                self.frames.push(Frame {
                    tag: tag.clone(),
                    reference_list,
                });
            }
            MarkupEvent::Text(_) => self.step(&event),
            MarkupEvent::Close(tag) => {
                if let Some(pos) = self.frames.iter().rposition(|f| f.tag == *tag) {
                    self.close_to(pos);
                }
            }
        }
    }

    fn imply_end_tags(&mut self, tag: &str) {
        if CLOSES_PARAGRAPH.contains(&tag) {
            self.close_in_scope("p", SCOPE_BOUNDARIES);
        }
        if tag == "li" {
            self.close_in_scope("li", LIST_BOUNDARIES);
        }
    }

    /// Close the innermost open `target` unless a boundary element comes
    /// first.
    fn close_in_scope(&mut self, target: &str, boundaries: &[&str]) {
        let found = self.frames.iter().rposition(|f| {
            f.tag == target
                || boundaries.contains(&f.tag.as_str())
                || SCOPE_BOUNDARIES.contains(&f.tag.as_str())
        });
        if let Some(pos) = found
            && self.frames[pos].tag == target
        {
            self.close_to(pos);
        }
    }

    /// Close the element at `pos` and everything opened after it.
    fn close_to(&mut self, pos: usize) {
        while self.frames.len() > pos {
            self.close_top();
        }
    }

    fn in_region(&self) -> bool {
        self.region_start.is_some_and(|start| self.frames.len() > start)
    }

    fn close_top(&mut self) {
        let Some(tag) = self.frames.last().map(|f| f.tag.clone()) else {
            return;
        };
        if self.in_region() {
            self.step(&MarkupEvent::Close(tag));
        }
        self.frames.pop();
        if !self.in_region() {
            self.region_start = None;
        }
    }

    fn step(&mut self, event: &MarkupEvent) {
        let region: &[Frame] = match self.region_start {
            Some(start) => &self.frames[start..],
            None => &[],
        };
        let ctx = Context {
            depth: region.len(),
            parent: region.last().map(|f| f.tag.as_str()),
            in_reference_list: region.iter().any(|f| f.reference_list),
            resolved: self.resolved,
        };
        let state = std::mem::replace(&mut self.state, State::Idle);
        let Step { next, output } = transition(state, event, &ctx);
        self.state = next;
        if let Some(output) = output {
            self.record(output);
        }
    }

    fn record(&mut self, output: Output) {
        match output {
            Output::Title(title) => {
                self.resolved.title = true;
                self.title = Some(title);
            }
            Output::Author(name) => self.paper.authors.push(name),
            Output::AuthorGroupClosed => {
                self.resolved.authors = true;
                self.paper.kind = PaperKind::RepositoryNative;
            }
            Output::AbstractHeadingMatched => self.resolved.abstract_text = true,
            Output::Abstract(text) => self.paper.abstract_text = text,
            Output::Entry(EntryShape::List, reference) => self.listed.push(reference),
            Output::Entry(EntryShape::Generic, reference) => self.generic.push(reference),
            Output::ReferenceContainerClosed => {
                self.resolved.references = true;
                let chosen = if self.listed.is_empty() {
                    std::mem::take(&mut self.generic)
                } else {
                    std::mem::take(&mut self.listed)
                };
                self.paper.references.extend(chosen);
                self.listed.clear();
                self.generic.clear();
            }
        }
    }

    /// Close whatever is still open and hand out the paper.
    pub fn finish(mut self, accession: &str) -> Result<ExtractionResult, ExtractionError> {
        self.close_to(0);

        let mut paper = self.paper;
        paper.title = self.title.ok_or(ExtractionError::MissingTitle)?;
        paper.repository_id = Some(accession.to_string());

        let mut warnings = Vec::new();
        if paper.references.is_empty() {
            tracing::debug!(accession, "no reference entries found");
            warnings.push(ExtractionError::MissingReferenceContainer);
        }

        tracing::debug!(
            accession,
            authors = paper.authors.len(),
            references = paper.references.len(),
            "stream extraction complete"
        );

        Ok(ExtractionResult { paper, warnings })
    }
}

/// Extracts a paper in one forward pass over markup events.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamExtractor;

impl StreamExtractor {
    pub fn extract<I>(&self, events: I, accession: &str) -> Result<ExtractionResult, ExtractionError>
    where
        I: IntoIterator<Item = MarkupEvent>,
    {
        let mut machine = StreamMachine::new();
        for event in events {
            machine.feed(event);
        }
        machine.finish(accession)
    }
}

impl PaperExtractor for StreamExtractor {
    fn name(&self) -> &str {
        "stream"
    }

    fn extract_markup(
        &self,
        markup: &str,
        accession: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        self.extract(tokenize::events(markup), accession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(depth: usize) -> Context<'static> {
        Context {
            depth,
            ..Context::default()
        }
    }

    fn open(tag: &str, class: &str) -> MarkupEvent {
        MarkupEvent::open(tag, &[("class", class)])
    }

    // ── Transition table ────────────────────────────────────────────────

    #[test]
    fn idle_enters_title_on_title_landmark() {
        let step = transition(State::Idle, &open("h1", "content-title"), &ctx(0));
        assert_eq!(
            step.next,
            State::Title {
                text: String::new()
            }
        );
        assert_eq!(step.output, None);
    }

    #[test]
    fn idle_ignores_unknown_markup() {
        for event in [
            open("h1", "other"),
            MarkupEvent::open("div", &[]),
            MarkupEvent::text("stray"),
            MarkupEvent::close("div"),
        ] {
            let step = transition(State::Idle, &event, &ctx(0));
            assert_eq!(step, Step::to(State::Idle));
        }
    }

    #[test]
    fn resolved_landmarks_are_not_entered_again() {
        let context = Context {
            resolved: Resolved {
                title: true,
                authors: true,
                ..Resolved::default()
            },
            ..Context::default()
        };
        let title = transition(State::Idle, &open("h1", "content-title"), &context);
        assert_eq!(title.next, State::Idle);
        let authors = transition(State::Idle, &open("div", "contrib-group fm-author"), &context);
        assert_eq!(authors.next, State::Idle);
    }

    #[test]
    fn title_leaves_only_on_its_own_close() {
        let state = State::Title {
            text: "Inhibition of ".into(),
        };
        let inner = transition(state, &MarkupEvent::close("i"), &ctx(2));
        assert!(matches!(inner.next, State::Title { .. }));

        let outer = transition(inner.next, &MarkupEvent::close("h1"), &ctx(1));
        assert_eq!(outer.next, State::Idle);
        assert_eq!(outer.output, Some(Output::Title("Inhibition of".into())));
    }

    #[test]
    fn author_list_and_element_round_trip() {
        let step = transition(State::AuthorList, &MarkupEvent::open("a", &[]), &ctx(2));
        assert_eq!(
            step.next,
            State::AuthorElement {
                depth: 3,
                text: String::new()
            }
        );

        let step = transition(step.next, &MarkupEvent::text("Smith J"), &ctx(3));
        let step = transition(step.next, &MarkupEvent::close("a"), &ctx(3));
        assert_eq!(step.next, State::AuthorList);
        assert_eq!(step.output, Some(Output::Author("Smith J".into())));

        let step = transition(State::AuthorList, &MarkupEvent::close("div"), &ctx(1));
        assert_eq!(step.next, State::Idle);
        assert_eq!(step.output, Some(Output::AuthorGroupClosed));
    }

    #[test]
    fn author_element_ignores_nested_close() {
        let state = State::AuthorElement {
            depth: 2,
            text: "Doe".into(),
        };
        let step = transition(state.clone(), &MarkupEvent::close("sup"), &ctx(3));
        assert_eq!(step.next, state);
        assert_eq!(step.output, None);
    }

    #[test]
    fn abstract_heading_is_matched_by_label() {
        let heading = State::AbstractHeading {
            label: " Abstract ".into(),
        };
        let step = transition(heading, &MarkupEvent::close("h2"), &ctx(1));
        assert_eq!(step.next, State::AbstractPending);
        assert_eq!(step.output, Some(Output::AbstractHeadingMatched));

        let other = State::AbstractHeading {
            label: "Methods".into(),
        };
        let step = transition(other, &MarkupEvent::close("h2"), &ctx(1));
        assert_eq!(step, Step::to(State::Idle));
    }

    #[test]
    fn pending_abstract_gives_up_at_next_landmark() {
        let context = Context {
            resolved: Resolved {
                abstract_text: true,
                ..Resolved::default()
            },
            ..Context::default()
        };
        let step = transition(
            State::AbstractPending,
            &open("div", "ref-list-sec sec"),
            &context,
        );
        assert_eq!(step.next, State::ReferenceList);
        assert_eq!(step.output, Some(Output::Abstract(String::new())));

        let step = transition(State::AbstractPending, &open("h2", ""), &context);
        assert_eq!(step.next, State::Idle);
        assert_eq!(step.output, Some(Output::Abstract(String::new())));
    }

    #[test]
    fn reference_entry_shape_depends_on_parent() {
        let listed = Context {
            depth: 3,
            parent: Some("li"),
            in_reference_list: true,
            ..Context::default()
        };
        let step = transition(State::ReferenceList, &MarkupEvent::open("span", &[]), &listed);
        assert!(matches!(
            step.next,
            State::ReferenceEntry {
                depth: 4,
                shape: EntryShape::List,
                ..
            }
        ));

        let generic = Context {
            depth: 2,
            parent: Some("div"),
            ..Context::default()
        };
        let step = transition(State::ReferenceList, &MarkupEvent::open("span", &[]), &generic);
        assert!(matches!(
            step.next,
            State::ReferenceEntry {
                shape: EntryShape::Generic,
                ..
            }
        ));

        let loose = Context {
            depth: 2,
            parent: Some("p"),
            ..Context::default()
        };
        let step = transition(State::ReferenceList, &MarkupEvent::open("span", &[]), &loose);
        assert_eq!(step.next, State::ReferenceList);
    }

    // ── Machine ─────────────────────────────────────────────────────────

    fn run(events: Vec<MarkupEvent>) -> Result<ExtractionResult, ExtractionError> {
        StreamExtractor.extract(events, "PMC1")
    }

    fn title_events(title: &str) -> Vec<MarkupEvent> {
        vec![
            open("h1", "content-title"),
            MarkupEvent::text(title),
            MarkupEvent::close("h1"),
        ]
    }

    #[test]
    fn extracts_title_and_authors() {
        let mut events = title_events("Inhibition of X in Y");
        events.extend([
            open("div", "contrib-group fm-author"),
            MarkupEvent::open("a", &[("href", "/a/1")]),
            MarkupEvent::text("Smith J"),
            MarkupEvent::close("a"),
            MarkupEvent::text(", "),
            MarkupEvent::open("a", &[("href", "/a/2")]),
            MarkupEvent::text("Doe A"),
            MarkupEvent::close("a"),
            MarkupEvent::close("div"),
        ]);
        let paper = run(events).unwrap().paper;
        assert_eq!(paper.title, "Inhibition of X in Y");
        assert_eq!(paper.authors, vec!["Smith J", "Doe A"]);
        assert_eq!(paper.kind, PaperKind::RepositoryNative);
        assert_eq!(paper.repository_id.as_deref(), Some("PMC1"));
    }

    #[test]
    fn missing_title_is_fatal() {
        let events = vec![MarkupEvent::open("p", &[]), MarkupEvent::close("p")];
        assert!(matches!(run(events), Err(ExtractionError::MissingTitle)));
    }

    #[test]
    fn nested_container_does_not_end_author_list_early() {
        let mut events = title_events("T");
        events.extend([
            open("div", "contrib-group fm-author"),
            MarkupEvent::open("div", &[]),
            MarkupEvent::open("a", &[]),
            MarkupEvent::text("First A"),
            MarkupEvent::close("a"),
            MarkupEvent::close("div"),
            MarkupEvent::open("a", &[]),
            MarkupEvent::text("Second B"),
            MarkupEvent::close("a"),
            MarkupEvent::close("div"),
            MarkupEvent::open("a", &[]),
            MarkupEvent::text("Not an author"),
            MarkupEvent::close("a"),
        ]);
        let paper = run(events).unwrap().paper;
        assert_eq!(paper.authors, vec!["First A", "Second B"]);
    }

    #[test]
    fn unmatched_close_is_ignored_and_missing_close_is_implied() {
        let events = vec![
            open("h1", "content-title"),
            MarkupEvent::text("Half "),
            MarkupEvent::close("span"),
            MarkupEvent::open("b", &[]),
            MarkupEvent::text("open"),
            MarkupEvent::close("h1"),
            open("div", "contrib-group fm-author"),
            MarkupEvent::open("a", &[]),
            MarkupEvent::text("Truncated"),
        ];
        let mut machine = StreamMachine::new();
        for event in events {
            machine.feed(event);
        }
        assert!(matches!(machine.state(), State::AuthorElement { .. }));
        let paper = machine.finish("PMC1").unwrap().paper;
        assert_eq!(paper.title, "Half open");
        assert_eq!(paper.authors, vec!["Truncated"]);
    }

    fn abstract_events(tail: Vec<MarkupEvent>) -> Vec<MarkupEvent> {
        let mut events = title_events("T");
        events.extend([
            open("div", "sec"),
            MarkupEvent::open("h2", &[]),
            MarkupEvent::text("Abstract"),
            MarkupEvent::close("h2"),
            MarkupEvent::open("p", &[]),
            MarkupEvent::text("We studied things."),
        ]);
        events.extend(tail);
        events.extend([
            open("div", "ref-list-sec sec"),
            open("ul", "back-ref-list"),
            MarkupEvent::open("li", &[]),
            MarkupEvent::open("span", &[]),
            MarkupEvent::text("Ref A. 2001"),
            MarkupEvent::close("span"),
            MarkupEvent::close("li"),
            MarkupEvent::close("ul"),
            MarkupEvent::close("div"),
        ]);
        events
    }

    #[test]
    fn closing_an_ancestor_ends_the_abstract() {
        let paper = run(abstract_events(vec![MarkupEvent::close("div")]))
            .unwrap()
            .paper;
        assert_eq!(paper.abstract_text, "We studied things.");
        assert_eq!(paper.references.len(), 1);
        assert_eq!(paper.references[0].raw_text, "Ref A. 2001");
    }

    #[test]
    fn block_element_implies_paragraph_end() {
        let tail = vec![
            MarkupEvent::open("h2", &[]),
            MarkupEvent::text("Methods"),
            MarkupEvent::close("h2"),
            MarkupEvent::close("div"),
        ];
        let paper = run(abstract_events(tail)).unwrap().paper;
        assert_eq!(paper.abstract_text, "We studied things.");
        assert_eq!(paper.references.len(), 1);
    }

    #[test]
    fn unclosed_list_items_end_at_the_next_item() {
        let mut events = title_events("T");
        events.extend([
            open("div", "ref-list-sec sec"),
            open("ul", "back-ref-list"),
            MarkupEvent::open("li", &[]),
            MarkupEvent::open("span", &[]),
            MarkupEvent::text("Ref A. 2001"),
            MarkupEvent::close("span"),
            MarkupEvent::open("li", &[]),
            MarkupEvent::open("span", &[]),
            MarkupEvent::text("Ref B. 2002"),
            MarkupEvent::close("span"),
            MarkupEvent::close("ul"),
            MarkupEvent::close("div"),
        ]);
        let refs = run(events).unwrap().paper.references;
        let texts: Vec<_> = refs.iter().map(|r| r.raw_text.as_str()).collect();
        assert_eq!(texts, vec!["Ref A. 2001", "Ref B. 2002"]);
    }

    #[test]
    fn paragraph_is_not_closed_across_a_table_cell() {
        let events = vec![
            MarkupEvent::open("p", &[]),
            MarkupEvent::open("td", &[]),
            open("h1", "content-title"),
            MarkupEvent::text("Inside"),
            MarkupEvent::close("h1"),
        ];
        let mut machine = StreamMachine::new();
        for event in events {
            machine.feed(event);
        }
        let tags: Vec<_> = machine.frames.iter().map(|f| f.tag.as_str()).collect();
        assert_eq!(tags, vec!["p", "td"]);
        assert_eq!(machine.finish("PMC1").unwrap().paper.title, "Inside");
    }

    #[test]
    fn reference_entries_collect_links_and_fields() {
        let mut events = title_events("T");
        events.extend([
            open("div", "ref-list-sec sec"),
            open("ul", "back-ref-list"),
            MarkupEvent::open("li", &[]),
            MarkupEvent::open("span", &[]),
            MarkupEvent::text("Smith J. Some Study. "),
            open("span", "ref-journal"),
            MarkupEvent::text("J Med."),
            MarkupEvent::close("span"),
            MarkupEvent::text(" 2001 ["),
            MarkupEvent::open("a", &[("href", "/pubmed/123")]),
            MarkupEvent::text("PubMed"),
            MarkupEvent::close("a"),
            MarkupEvent::text("]"),
            MarkupEvent::close("span"),
            MarkupEvent::close("li"),
            MarkupEvent::close("ul"),
            MarkupEvent::close("div"),
        ]);
        let result = run(events).unwrap();
        assert!(result.warnings.is_empty());
        let refs = result.paper.references;
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].raw_text, "Smith J. Some Study. J Med. 2001");
        assert_eq!(refs[0].journal.as_deref(), Some("J Med."));
        assert_eq!(refs[0].volume, None);
        assert_eq!(refs[0].external_link_pubmed.as_deref(), Some("/pubmed/123"));
        assert_eq!(refs[0].external_link_fulltext, None);
    }

    #[test]
    fn list_shape_wins_over_div_shape() {
        let mut events = title_events("T");
        events.extend([
            open("div", "ref-list-sec sec"),
            MarkupEvent::open("div", &[]),
            MarkupEvent::open("span", &[]),
            MarkupEvent::text("Generic entry"),
            MarkupEvent::close("span"),
            MarkupEvent::close("div"),
            open("ul", "back-ref-list"),
            MarkupEvent::open("li", &[]),
            MarkupEvent::open("span", &[]),
            MarkupEvent::text("Listed entry"),
            MarkupEvent::close("span"),
            MarkupEvent::close("li"),
            MarkupEvent::close("ul"),
            MarkupEvent::close("div"),
        ]);
        let refs = run(events).unwrap().paper.references;
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].raw_text, "Listed entry");
    }

    #[test]
    fn no_references_is_a_warning() {
        let result = run(title_events("T")).unwrap();
        assert!(result.paper.references.is_empty());
        assert!(matches!(
            result.warnings.as_slice(),
            [ExtractionError::MissingReferenceContainer]
        ));
        assert_eq!(result.paper.kind, PaperKind::Generic);
    }
}
