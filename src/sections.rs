//! Section state shared by the views of a single top-level render.
//!
//! A child view captures output into named sections with `@section` and
//! `@stop`, a parent view reads them back with `@yield`. Because the child is
//! rendered before the parent, the captures are held here between views.

use std::collections::BTreeMap;

use crate::{Error, Result};

/// The token replaced by the parent content when a section is extended.
const PARENT: &str = "@parent";

/// Named section content and the stack of sections currently being captured.
#[derive(Debug, Default)]
pub struct Sections {
    stack: Vec<Capture>,
    table: BTreeMap<String, String>,
}

#[derive(Debug)]
struct Capture {
    name: String,
    buf: String,
}

impl Sections {
    /// Construct empty section state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins capturing output for the named section.
    pub fn start(&mut self, name: impl Into<String>) {
        self.stack.push(Capture {
            name: name.into(),
            buf: String::new(),
        });
    }

    /// Finalizes the named section with the given content immediately,
    /// without capturing.
    pub fn start_with(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.extend(name, content);
    }

    /// Sets the content of a section. Same as [`start_with`][Self::start_with].
    pub fn inject(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.extend(name, content);
    }

    /// Returns the buffer of the section currently being captured.
    pub fn buffer_mut(&mut self) -> Option<&mut String> {
        self.stack.last_mut().map(|capture| &mut capture.buf)
    }

    /// Stops capturing the most recently started section, stores its content
    /// and returns its name.
    pub fn stop(&mut self) -> Result<String> {
        let Capture { name, buf } = self.stack.pop().ok_or_else(Error::section_underflow)?;
        self.extend(name.clone(), buf);
        Ok(name)
    }

    /// Stores content for the named section.
    ///
    /// If the section already has content, every `@parent` token in the
    /// existing content is replaced by the new content. Because child views
    /// render first, the existing content belongs to the child and the new
    /// content to its parent.
    pub fn extend(&mut self, name: impl Into<String>, content: impl Into<String>) {
        let name = name.into();
        let content = content.into();
        let content = match self.table.get(&name) {
            Some(existing) => existing.replace(PARENT, &content),
            None => content,
        };
        self.table.insert(name, content);
    }

    /// Stops capturing the current section and returns its content.
    pub fn yield_section(&mut self) -> Result<String> {
        let name = self.stop()?;
        Ok(self.yield_content(&name).to_owned())
    }

    /// Returns the content of the named section, or the empty string.
    pub fn yield_content(&self, name: &str) -> &str {
        self.table.get(name).map(String::as_str).unwrap_or("")
    }

    /// Returns whether the named section has content.
    pub fn has(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Returns the number of sections currently being captured.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// The section state as seen by a single view render.
///
/// Captures started during the frame are discarded if the frame is dropped
/// without being committed, so a failed render never leaves a partially
/// captured section behind.
pub(crate) struct Frame<'s> {
    sections: &'s mut Sections,
    base: usize,
}

impl<'s> Frame<'s> {
    pub fn begin(sections: &'s mut Sections) -> Self {
        let base = sections.depth();
        Self { sections, base }
    }

    pub fn sections(&mut self) -> &mut Sections {
        self.sections
    }

    /// Returns where output should be written: the innermost capture started
    /// in this frame, or the view output.
    pub fn writer<'a>(&'a mut self, out: &'a mut String) -> &'a mut String {
        if self.sections.depth() > self.base {
            if let Some(buf) = self.sections.buffer_mut() {
                return buf;
            }
        }
        out
    }

    /// Stops a section started in this frame.
    pub fn stop(&mut self) -> Result<String> {
        if self.sections.depth() <= self.base {
            tracing::warn!("stop_section called with no section open");
            return Err(Error::section_underflow());
        }
        self.sections.stop()
    }

    /// Stops a section started in this frame and returns its content.
    pub fn yield_section(&mut self) -> Result<String> {
        if self.sections.depth() <= self.base {
            tracing::warn!("yield_section called with no section open");
            return Err(Error::section_underflow());
        }
        self.sections.yield_section()
    }

    /// Finishes the frame, failing if a section is still being captured.
    pub fn commit(self) -> Result<()> {
        match self.sections.stack.get(self.base) {
            Some(capture) => {
                tracing::warn!(section = %capture.name, "view finished with an open section");
                Err(Error::unclosed_section(&capture.name))
            }
            None => Ok(()),
        }
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        self.sections.stack.truncate(self.base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn sections_capture_and_yield() {
        let mut sections = Sections::new();
        sections.start("foo");
        sections.buffer_mut().unwrap().push_str("hi");
        assert_eq!(sections.stop().unwrap(), "foo");
        assert_eq!(sections.yield_content("foo"), "hi");
    }

    #[test]
    fn sections_stop_is_lifo() {
        let mut sections = Sections::new();
        sections.start("outer");
        sections.start("inner");
        assert_eq!(sections.stop().unwrap(), "inner");
        assert_eq!(sections.stop().unwrap(), "outer");
    }

    #[test]
    fn sections_extend_replaces_parent_token() {
        let mut sections = Sections::new();
        sections.start("foo");
        sections.buffer_mut().unwrap().push_str("X@parentY");
        sections.stop().unwrap();
        sections.start("foo");
        sections.buffer_mut().unwrap().push_str("Z");
        sections.stop().unwrap();
        assert_eq!(sections.yield_content("foo"), "XZY");
    }

    #[test]
    fn sections_extend_multi_level() {
        let mut sections = Sections::new();
        sections.extend("foo", "a@parentb");
        sections.extend("foo", "c@parentd");
        sections.extend("foo", "e");
        assert_eq!(sections.yield_content("foo"), "acedb");
    }

    #[test]
    fn sections_start_with_and_inject() {
        let mut sections = Sections::new();
        sections.start_with("title", "Home");
        sections.inject("nav", "links");
        assert_eq!(sections.depth(), 0);
        assert_eq!(sections.yield_content("title"), "Home");
        assert_eq!(sections.yield_content("nav"), "links");
    }

    #[test]
    fn sections_yield_unknown_is_empty() {
        let sections = Sections::new();
        assert_eq!(sections.yield_content("missing"), "");
        assert!(!sections.has("missing"));
    }

    #[test]
    fn sections_yield_section() {
        let mut sections = Sections::new();
        sections.extend("foo", "child @parent");
        sections.start("foo");
        sections.buffer_mut().unwrap().push_str("base");
        assert_eq!(sections.yield_section().unwrap(), "child base");
    }

    #[test]
    fn sections_stop_underflow() {
        let mut sections = Sections::new();
        let err = sections.stop().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SectionUnderflow);
    }

    #[test]
    fn frame_dropped_discards_captures() {
        let mut sections = Sections::new();
        sections.start("outer");
        {
            let mut frame = Frame::begin(&mut sections);
            frame.sections().start("inner");
            let mut out = String::new();
            frame.writer(&mut out).push_str("lost");
        }
        assert_eq!(sections.depth(), 1);
        assert!(!sections.has("inner"));
    }

    #[test]
    fn frame_commit_unclosed() {
        let mut sections = Sections::new();
        let mut frame = Frame::begin(&mut sections);
        frame.sections().start("open");
        let err = frame.commit().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnclosedSection);
        assert_eq!(sections.depth(), 0);
    }

    #[test]
    fn frame_cannot_stop_outer_section() {
        let mut sections = Sections::new();
        sections.start("outer");
        let mut frame = Frame::begin(&mut sections);
        let err = frame.stop().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SectionUnderflow);
    }

    #[test]
    fn frame_writer_targets_capture() {
        let mut sections = Sections::new();
        let mut out = String::new();
        {
            let mut frame = Frame::begin(&mut sections);
            frame.writer(&mut out).push_str("a");
            frame.sections().start("s");
            frame.writer(&mut out).push_str("b");
            frame.stop().unwrap();
            frame.writer(&mut out).push_str("c");
            frame.commit().unwrap();
        }
        assert_eq!(out, "ac");
        assert_eq!(sections.yield_content("s"), "b");
    }
}
