use chrono::{DateTime, Utc};

/// One episode or chapter of a title.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    /// Absolute URL of a cover or thumbnail image.
    pub enclosure: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            link: link.into(),
            description: None,
            created: None,
            updated: None,
            enclosure: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.is_empty());
        self
    }

    pub fn with_created(mut self, created: Option<DateTime<Utc>>) -> Self {
        self.created = created;
        self
    }

    pub fn with_updated(mut self, updated: Option<DateTime<Utc>>) -> Self {
        self.updated = updated;
        self
    }

    pub fn with_enclosure(mut self, enclosure: Option<String>) -> Self {
        self.enclosure = enclosure.filter(|e| !e.is_empty());
        self
    }

    /// Latest of the item's own timestamps.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.created.max(self.updated)
    }
}

/// Normalized feed for a single title, in the site's presentation order.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub author: String,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub items: Vec<Item>,
}

impl Feed {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            description: String::new(),
            author: String::new(),
            created: None,
            updated: None,
            items: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_created(mut self, created: Option<DateTime<Utc>>) -> Self {
        self.created = created;
        self
    }

    pub fn with_updated(mut self, updated: Option<DateTime<Utc>>) -> Self {
        self.updated = updated;
        self
    }

    pub fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    /// Raise `updated` to `candidate` when it is later than what is recorded.
    pub fn bump_updated(&mut self, candidate: Option<DateTime<Utc>>) {
        if candidate > self.updated {
            self.updated = candidate;
        }
    }
}
