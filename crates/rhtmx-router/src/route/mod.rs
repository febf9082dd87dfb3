/// Route module: patterns and the nodes that own them
///
/// - `pattern`: compiling and matching single URL patterns
/// - `node`: route-tree nodes pairing a pattern with children, a guard and a page

pub mod node;
pub mod pattern;

// Re-export commonly used types
pub use node::RouteNode;
pub use pattern::{classify_segment, PatternMatch, PatternSegmentType, UrlPattern};
