mod element;
mod tracker;

pub use element::ElementRef;
pub use tracker::SelectionTracker;
