//! # Comments
//!
//! Comment bodies live in `word/comments.xml`; threading and resolution live
//! in `word/commentsExtended.xml`, keyed by the `w14:paraId` of each comment's
//! last paragraph. The body carries range markers plus a reference run:
//!
//! ```text
//! <w:commentRangeStart w:id="0"/> anchored text <w:commentRangeEnd w:id="0"/>
//! <w:r><w:rPr><w:rStyle w:val="CommentReference"/></w:rPr><w:commentReference w:id="0"/></w:r>
//! ```

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use redline_common::{walk_children, Visitor, Walk};
use redline_parser::{parse_bytes, serialize, XmlDocument, XmlElement, XmlNode};
use serde::{Deserialize, Serialize};

use crate::errors::{EditorError, EditorResult};
use crate::id_generator::IDGenerator;
use crate::matcher::Match;
use crate::mutations::{place, split_run_at, InsertionPoint, RevisionStamp};
use crate::package::Package;
use crate::revisions::parse_date;
use crate::tree::*;

pub const COMMENTS_PART: &str = "word/comments.xml";
pub const COMMENTS_EXTENDED_PART: &str = "word/commentsExtended.xml";

const COMMENTS_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.comments+xml";
const COMMENTS_EXTENDED_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.commentsExtended+xml";
const COMMENTS_RELATIONSHIP: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
const COMMENTS_EXTENDED_RELATIONSHIP: &str = "http://schemas.microsoft.com/office/2011/relationships/commentsExtended";

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const W14_NS: &str = "http://schemas.microsoft.com/office/word/2010/wordml";
const W15_NS: &str = "http://schemas.microsoft.com/office/word/2012/wordml";
const MC_NS: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";

const W_COMMENT: &str = "w:comment";
const W15_COMMENT_EX: &str = "w15:commentEx";
const PARA_ID: &str = "w14:paraId";
const EX_PARA_ID: &str = "w15:paraId";
const EX_PARENT: &str = "w15:paraIdParent";
const EX_DONE: &str = "w15:done";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentReply {
    pub id: u32,
    pub author: String,
    pub date: Option<DateTime<Utc>>,
    pub text: String,
}

/// A top-level comment with its thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u32,
    pub author: String,
    pub initials: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub text: String,
    pub resolved: bool,
    /// Visible text between the range markers, if the body has them
    pub anchor_text: Option<String>,
    pub replies: Vec<CommentReply>,
}

/// The comments parts of one document
#[derive(Debug, Clone)]
pub struct CommentStore {
    comments: XmlDocument,
    extended: Option<XmlDocument>,
    para_ids: IDGenerator,
}

impl CommentStore {
    /// Empty comments part
    pub fn new(seed: &str) -> Self {
        let root = XmlElement::new("w:comments")
            .with_attr("xmlns:w", W_NS)
            .with_attr("xmlns:w14", W14_NS)
            .with_attr("xmlns:mc", MC_NS)
            .with_attr("mc:Ignorable", "w14");
        Self {
            comments: XmlDocument::new(root),
            extended: None,
            para_ids: IDGenerator::new(seed),
        }
    }

    /// Load existing comments parts, if the package has them
    pub fn load(package: &Package, seed: &str) -> EditorResult<Option<Self>> {
        let Some(bytes) = package.get(COMMENTS_PART) else {
            return Ok(None);
        };
        let comments = parse_bytes(COMMENTS_PART, bytes)?;
        let extended = package
            .get(COMMENTS_EXTENDED_PART)
            .map(|bytes| parse_bytes(COMMENTS_EXTENDED_PART, bytes))
            .transpose()?;
        Ok(Some(Self {
            comments,
            extended,
            para_ids: IDGenerator::new(seed),
        }))
    }

    /// Write both parts back and make sure the package declares them
    pub fn write_into(&self, package: &mut Package) -> EditorResult<()> {
        package.set(COMMENTS_PART, serialize(&self.comments).into_bytes());
        package.register_part(COMMENTS_PART, COMMENTS_CONTENT_TYPE, COMMENTS_RELATIONSHIP)?;
        if let Some(extended) = &self.extended {
            package.set(COMMENTS_EXTENDED_PART, serialize(extended).into_bytes());
            package.register_part(
                COMMENTS_EXTENDED_PART,
                COMMENTS_EXTENDED_CONTENT_TYPE,
                COMMENTS_EXTENDED_RELATIONSHIP,
            )?;
        }
        Ok(())
    }

    fn comment_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.comments.root.elements().filter(|e| e.is(W_COMMENT))
    }

    fn comment(&self, id: u32) -> Option<&XmlElement> {
        self.comment_elements().find(|e| element_id(e) == Some(id))
    }

    fn comment_mut(&mut self, id: u32) -> Option<&mut XmlElement> {
        self.comments
            .root
            .children
            .iter_mut()
            .filter_map(XmlNode::as_element_mut)
            .find(|e| e.is(W_COMMENT) && element_id(e) == Some(id))
    }

    fn next_id(&self, tree: &DocumentTree) -> u32 {
        let in_part = self.comment_elements().filter_map(element_id).max();
        let in_body = tree
            .root()
            .find_paths(is_comment_marker)
            .iter()
            .filter_map(|path| tree.root().get(path).and_then(element_id))
            .max();
        match in_part.max(in_body) {
            Some(max) => max + 1,
            None => 0,
        }
    }

    fn existing_para_ids(&self) -> HashSet<String> {
        self.comments
            .root
            .find_paths(|e| e.attr(PARA_ID).is_some())
            .iter()
            .filter_map(|path| self.comments.root.get(path)?.attr(PARA_ID).map(str::to_string))
            .collect()
    }

    fn fresh_para_id(&mut self, taken: &HashSet<String>) -> String {
        loop {
            let id = self.para_ids.new_para_id();
            if !taken.contains(&id) {
                return id;
            }
        }
    }

    /// The thread key of a comment, assigning one if the part lacks it
    fn ensure_para_id(&mut self, id: u32) -> EditorResult<String> {
        if let Some(existing) = self.comment(id).and_then(comment_para_id) {
            return Ok(existing);
        }
        let taken = self.existing_para_ids();
        let para_id = self.fresh_para_id(&taken);
        ensure_namespace(&mut self.comments.root, "w14", W14_NS);

        let comment = self.comment_mut(id).ok_or(EditorError::CommentNotFound(id))?;
        if !comment.elements().any(|e| e.is(W_P)) {
            comment.children.push(XmlElement::new(W_P).into());
        }
        if let Some(paragraph) = comment
            .children
            .iter_mut()
            .filter_map(XmlNode::as_element_mut)
            .filter(|e| e.is(W_P))
            .last()
        {
            paragraph.set_attr(PARA_ID, para_id.as_str());
        }
        Ok(para_id)
    }

    fn extended_mut(&mut self) -> &mut XmlElement {
        let extended = self.extended.get_or_insert_with(|| {
            XmlDocument::new(
                XmlElement::new("w15:commentsEx")
                    .with_attr("xmlns:w15", W15_NS)
                    .with_attr("xmlns:mc", MC_NS)
                    .with_attr("mc:Ignorable", "w15"),
            )
        });
        &mut extended.root
    }

    /// paraId -> (parent paraId, done)
    fn thread_info(&self) -> HashMap<String, (Option<String>, bool)> {
        let Some(extended) = &self.extended else {
            return HashMap::new();
        };
        extended
            .root
            .elements()
            .filter(|e| e.is(W15_COMMENT_EX))
            .filter_map(|e| {
                let para = e.attr(EX_PARA_ID)?.to_string();
                let parent = e.attr(EX_PARENT).map(str::to_string);
                let done = matches!(e.attr(EX_DONE), Some("1") | Some("true"));
                Some((para, (parent, done)))
            })
            .collect()
    }

    fn append_comment(
        &mut self,
        id: u32,
        stamp: &RevisionStamp,
        text: &str,
        parent_para: Option<String>,
    ) -> EditorResult<()> {
        let taken = self.existing_para_ids();
        let para_id = self.fresh_para_id(&taken);
        ensure_namespace(&mut self.comments.root, "w14", W14_NS);

        let mut comment = XmlElement::new(W_COMMENT)
            .with_attr(ATTR_ID, id.to_string())
            .with_attr(ATTR_AUTHOR, stamp.author.as_str())
            .with_attr(ATTR_DATE, stamp.date.as_str())
            .with_attr("w:initials", initials(&stamp.author));

        let lines: Vec<&str> = text.split('\n').collect();
        for (index, line) in lines.iter().enumerate() {
            let mut paragraph = XmlElement::new(W_P);
            if index + 1 == lines.len() {
                paragraph.set_attr(PARA_ID, para_id.as_str());
            }
            paragraph.children.push(
                XmlElement::new(W_PPR)
                    .with_child(XmlElement::new("w:pStyle").with_attr("w:val", "CommentText"))
                    .into(),
            );
            if index == 0 {
                paragraph.children.push(
                    XmlElement::new(W_R)
                        .with_child(reference_style())
                        .with_child(XmlElement::new("w:annotationRef"))
                        .into(),
                );
            }
            paragraph
                .children
                .push(XmlElement::new(W_R).with_child(text_element(W_T, line)).into());
            comment.children.push(paragraph.into());
        }
        self.comments.root.children.push(comment.into());

        let mut entry = XmlElement::new(W15_COMMENT_EX).with_attr(EX_PARA_ID, para_id.as_str());
        if let Some(parent) = parent_para {
            entry.set_attr(EX_PARENT, parent);
        }
        entry.set_attr(EX_DONE, "0");
        self.extended_mut().children.push(entry.into());
        Ok(())
    }
}

fn comment_para_id(comment: &XmlElement) -> Option<String> {
    comment
        .elements()
        .filter(|e| e.is(W_P))
        .last()?
        .attr(PARA_ID)
        .map(str::to_string)
}

fn comment_text(comment: &XmlElement) -> String {
    comment
        .elements()
        .filter(|e| e.is(W_P))
        .map(|paragraph| {
            paragraph
                .find_paths(|e| e.is(W_T))
                .iter()
                .filter_map(|path| paragraph.get(path).map(XmlElement::text))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn initials(author: &str) -> String {
    author
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

fn reference_style() -> XmlElement {
    XmlElement::new(W_RPR).with_child(XmlElement::new("w:rStyle").with_attr("w:val", "CommentReference"))
}

fn reference_run(id: u32) -> XmlElement {
    XmlElement::new(W_R)
        .with_child(reference_style())
        .with_child(XmlElement::new(W_COMMENT_REFERENCE).with_attr(ATTR_ID, id.to_string()))
}

fn marker(name: &str, id: u32) -> XmlElement {
    XmlElement::new(name).with_attr(ATTR_ID, id.to_string())
}

/// Declare a namespace prefix on a part root and mark it ignorable
fn ensure_namespace(root: &mut XmlElement, prefix: &str, uri: &str) {
    let declaration = format!("xmlns:{}", prefix);
    if root.attr(&declaration).is_some() {
        return;
    }
    root.set_attr(declaration, uri);
    if root.attr("xmlns:mc").is_none() {
        root.set_attr("xmlns:mc", MC_NS);
    }
    let ignorable = match root.attr("mc:Ignorable") {
        Some(existing) if existing.split_whitespace().any(|p| p == prefix) => existing.to_string(),
        Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), prefix),
        _ => prefix.to_string(),
    };
    root.set_attr("mc:Ignorable", ignorable);
}

/// Visible text between each comment's range markers
struct AnchorCollector {
    open: Vec<u32>,
    deleted: usize,
    texts: HashMap<u32, String>,
}

impl Visitor for AnchorCollector {
    fn enter_element(&mut self, element: &XmlElement, _path: &[usize]) -> Walk {
        if is_properties(element) {
            return Walk::Skip;
        }
        if is_deletion_wrapper(element) {
            self.deleted += 1;
        } else if element.is(W_COMMENT_RANGE_START) {
            if let Some(id) = element_id(element) {
                self.open.push(id);
                self.texts.entry(id).or_default();
            }
        } else if element.is(W_COMMENT_RANGE_END) {
            if let Some(id) = element_id(element) {
                self.open.retain(|open| *open != id);
            }
        } else if element.is(W_T) {
            if self.deleted == 0 {
                let text = element.text();
                for id in &self.open {
                    self.texts.entry(*id).or_default().push_str(&text);
                }
            }
            return Walk::Skip;
        }
        Walk::Descend
    }

    fn leave_element(&mut self, element: &XmlElement, _path: &[usize]) {
        if is_deletion_wrapper(element) {
            self.deleted = self.deleted.saturating_sub(1);
        } else if element.is(W_P) {
            for id in &self.open {
                self.texts.entry(*id).or_default().push('\n');
            }
        }
    }
}

fn anchor_texts(tree: &DocumentTree) -> HashMap<u32, String> {
    let mut collector = AnchorCollector {
        open: Vec::new(),
        deleted: 0,
        texts: HashMap::new(),
    };
    walk_children(&mut collector, tree.root());
    collector.texts
}

/// Anchor a new comment on a located match and return its id
pub fn add_comment(
    tree: &mut DocumentTree,
    store: &mut CommentStore,
    found: &Match,
    text: &str,
    stamp: &RevisionStamp,
) -> EditorResult<u32> {
    let (Some(start), Some(end)) = (found.point_before(), found.point_after()) else {
        return Err(EditorError::invalid_input("comment anchor resolved to no text"));
    };
    let id = store.next_id(tree);

    let mut paragraph = tree
        .paragraph(&found.paragraph)
        .cloned()
        .ok_or(EditorError::ParagraphOutOfRange(found.paragraph_index))?;

    // End first so the start node's path is unaffected
    let end_point = split_run_at(&mut paragraph, &end.node, end.offset)?;
    place(&mut paragraph, &end_point, marker(W_COMMENT_RANGE_END, id))?;
    let after_end = InsertionPoint {
        container: end_point.container.clone(),
        index: end_point.index + 1,
    };
    place(&mut paragraph, &after_end, reference_run(id))?;
    let start_point = split_run_at(&mut paragraph, &start.node, start.offset)?;
    place(&mut paragraph, &start_point, marker(W_COMMENT_RANGE_START, id))?;

    store.append_comment(id, stamp, text, None)?;
    if let Some(target) = tree.paragraph_mut(&found.paragraph) {
        *target = paragraph;
    }
    tracing::debug!(id, anchor = %found.text, "added comment");
    Ok(id)
}

/// Reply to an existing comment; the reply shares its parent's anchor
pub fn reply_to_comment(
    tree: &mut DocumentTree,
    store: &mut CommentStore,
    parent: u32,
    text: &str,
    stamp: &RevisionStamp,
) -> EditorResult<u32> {
    if store.comment(parent).is_none() {
        return Err(EditorError::CommentNotFound(parent));
    }
    let parent_para = store.ensure_para_id(parent)?;
    let id = store.next_id(tree);

    // Latest marker first so earlier paths stay valid
    let sibling_markers = [
        (W_COMMENT_REFERENCE, reference_run(id)),
        (W_COMMENT_RANGE_END, marker(W_COMMENT_RANGE_END, id)),
        (W_COMMENT_RANGE_START, marker(W_COMMENT_RANGE_START, id)),
    ];
    for (name, element) in sibling_markers {
        let Some(path) = tree
            .root()
            .find_paths(|e| e.is(name) && element_id(e) == Some(parent))
            .into_iter()
            .next()
        else {
            continue;
        };
        // References live inside a run; the reply's run goes after that run
        let path = if name == W_COMMENT_REFERENCE {
            path[..path.len() - 1].to_vec()
        } else {
            path
        };
        if let Some((container, index)) = split_last(&path) {
            if let Some(container) = tree.root_mut().get_mut(container) {
                container.children.insert(index + 1, element.into());
            }
        }
    }

    store.append_comment(id, stamp, text, Some(parent_para))?;
    Ok(id)
}

/// Top-level comments in part order, replies nested under their thread root
pub fn list_comments(tree: &DocumentTree, store: &CommentStore, author: Option<&str>) -> Vec<Comment> {
    let threads = store.thread_info();
    let anchors = anchor_texts(tree);

    let mut by_para = HashMap::new();
    for comment in store.comment_elements() {
        if let (Some(id), Some(para)) = (element_id(comment), comment_para_id(comment)) {
            by_para.insert(para, id);
        }
    }

    // Follow paraIdParent links up to the thread root
    let root_of = |para: &str| -> Option<u32> {
        let mut current = para.to_string();
        let mut root = None;
        for _ in 0..=by_para.len() {
            match threads.get(&current).and_then(|(parent, _)| parent.clone()) {
                Some(parent) if by_para.contains_key(&parent) => {
                    root = by_para.get(&parent).copied();
                    current = parent;
                }
                _ => break,
            }
        }
        root
    };

    let mut comments: Vec<Comment> = Vec::new();
    let mut replies: Vec<(u32, CommentReply)> = Vec::new();
    for element in store.comment_elements() {
        let Some(id) = element_id(element) else {
            continue;
        };
        let para = comment_para_id(element);
        let author_name = element.attr(ATTR_AUTHOR).unwrap_or_default().to_string();
        let date = element.attr(ATTR_DATE).and_then(parse_date);
        let text = comment_text(element);

        if let Some(root) = para.as_deref().and_then(|para| root_of(para)) {
            replies.push((
                root,
                CommentReply {
                    id,
                    author: author_name,
                    date,
                    text,
                },
            ));
            continue;
        }

        let resolved = para
            .as_ref()
            .and_then(|para| threads.get(para))
            .map_or(false, |(_, done)| *done);
        comments.push(Comment {
            id,
            author: author_name,
            initials: element.attr("w:initials").map(str::to_string),
            date,
            text,
            resolved,
            anchor_text: anchors.get(&id).map(|text| text.trim_end_matches('\n').to_string()),
            replies: Vec::new(),
        });
    }

    for (root, reply) in replies {
        if let Some(comment) = comments.iter_mut().find(|c| c.id == root) {
            comment.replies.push(reply);
        }
    }

    comments.retain(|comment| author.map_or(true, |author| comment.author == author));
    comments
}

/// Mark a comment thread as done
pub fn resolve_comment(store: &mut CommentStore, id: u32) -> EditorResult<()> {
    if store.comment(id).is_none() {
        return Err(EditorError::CommentNotFound(id));
    }
    let para = store.ensure_para_id(id)?;
    let extended = store.extended_mut();
    let entry = extended
        .children
        .iter_mut()
        .filter_map(XmlNode::as_element_mut)
        .find(|e| e.is(W15_COMMENT_EX) && e.attr(EX_PARA_ID) == Some(para.as_str()));
    match entry {
        Some(entry) => entry.set_attr(EX_DONE, "1"),
        None => extended.children.push(
            XmlElement::new(W15_COMMENT_EX)
                .with_attr(EX_PARA_ID, para.as_str())
                .with_attr(EX_DONE, "1")
                .into(),
        ),
    }
    Ok(())
}

/// Delete a comment with all its replies and body markers.
/// Returns every removed comment id.
pub fn delete_comment(tree: &mut DocumentTree, store: &mut CommentStore, id: u32) -> EditorResult<Vec<u32>> {
    if store.comment(id).is_none() {
        return Err(EditorError::CommentNotFound(id));
    }

    let threads = store.thread_info();
    let paras: HashMap<u32, String> = store
        .comment_elements()
        .filter_map(|e| Some((element_id(e)?, comment_para_id(e)?)))
        .collect();

    let mut removed = vec![id];
    let mut index = 0;
    while index < removed.len() {
        if let Some(para) = paras.get(&removed[index]) {
            for (child, child_para) in &paras {
                let is_reply = threads
                    .get(child_para)
                    .and_then(|(parent, _)| parent.as_ref())
                    == Some(para);
                if is_reply && !removed.contains(child) {
                    removed.push(*child);
                }
            }
        }
        index += 1;
    }

    let removed_set: HashSet<u32> = removed.iter().copied().collect();
    let removed_paras: HashSet<String> = removed.iter().filter_map(|id| paras.get(id).cloned()).collect();

    store.comments.root.children.retain(|node| match node {
        XmlNode::Element(e) if e.is(W_COMMENT) => !element_id(e).is_some_and(|id| removed_set.contains(&id)),
        _ => true,
    });
    if let Some(extended) = &mut store.extended {
        extended.root.children.retain(|node| match node {
            XmlNode::Element(e) if e.is(W15_COMMENT_EX) => {
                !e.attr(EX_PARA_ID).is_some_and(|para| removed_paras.contains(para))
            }
            _ => true,
        });
    }

    let markers = tree
        .root()
        .find_paths(|e| is_comment_marker(e) && element_id(e).is_some_and(|id| removed_set.contains(&id)));
    for path in markers.iter().rev() {
        remove_marker(tree.root_mut(), path);
    }

    tracing::debug!(id, removed = removed.len(), "deleted comment thread");
    Ok(removed)
}

fn remove_marker(root: &mut XmlElement, path: &[usize]) {
    let Some((parent_path, index)) = split_last(path) else {
        return;
    };
    let Some(parent) = root.get_mut(parent_path) else {
        return;
    };
    if index < parent.children.len() {
        parent.children.remove(index);
    }
    if parent.is(W_R) && !run_has_content(parent) {
        if let Some((run_parent, run_index)) = split_last(parent_path) {
            if let Some(container) = root.get_mut(run_parent) {
                if run_index < container.children.len() {
                    container.children.remove(run_index);
                }
            }
        }
    }
}
