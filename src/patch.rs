use crate::image::Image;
use crate::my_types::*;

/// Square template captured around a trajectory point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Patch {
    image: Image,
}

impl Patch {
    /// Copy the `edge` x `edge` region whose top-left is `center - edge / 2`.
    pub fn capture(frame: &Image, center: Vector2i, edge: usize) -> Patch {
        let edge = edge as i32;
        Patch {
            image: frame.crop(Rect::centered(center, edge, edge)),
        }
    }

    pub fn from_image(image: Image) -> Patch {
        Patch { image }
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn width(&self) -> usize {
        self.image.width
    }

    pub fn height(&self) -> usize {
        self.image.height
    }
}
