use geo::Point;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::{Hash, Hasher};

/// Something with a fixed geographic position that can be clustered.
///
/// Items are used as map keys throughout clustering and rendering, so
/// `Eq` and `Hash` must stay stable for as long as an item is clustered.
pub trait ClusterItem: Clone + Debug + Eq + Hash + Send + Sync + 'static {
    /// Geographic position, x = longitude and y = latitude.
    fn position(&self) -> Point<f64>;

    /// Title shown in the item's marker, if any.
    fn title(&self) -> Option<&str> {
        None
    }

    /// Secondary text shown in the item's marker, if any.
    fn snippet(&self) -> Option<&str> {
        None
    }
}

/// A general purpose clusterable item identified by a numeric id.
///
/// Equality and hashing only consider `id`, so two items with the same id are
/// the same item regardless of their text.
///
/// # Examples
///
/// ```
/// use geocluster_types::item::{ClusterItem, GeoItem};
///
/// let a = GeoItem::new(7, 13.4050, 52.5200).with_title("Berlin");
/// let b = GeoItem::new(7, 13.4050, 52.5200);
/// assert_eq!(a, b);
/// assert_eq!(a.position().y(), 52.5200);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoItem {
    pub id: u64,
    pub position: Point<f64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

impl GeoItem {
    /// Create an item at the given longitude/latitude.
    pub fn new(id: u64, longitude: f64, latitude: f64) -> Self {
        Self {
            id,
            position: Point::new(longitude, latitude),
            title: None,
            snippet: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

impl PartialEq for GeoItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GeoItem {}

impl Hash for GeoItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl ClusterItem for GeoItem {
    fn position(&self) -> Point<f64> {
        self.position
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn snippet(&self) -> Option<&str> {
        self.snippet.as_deref()
    }
}
