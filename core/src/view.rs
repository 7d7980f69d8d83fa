use crate::piece::{Piece, Transform};

/// A rendering surface with one visual handle per piece.
pub trait PieceView {
    fn set_transform(&mut self, piece: u32, transform: Transform, placed: bool);
    fn read_transform(&self, piece: u32) -> Option<Transform>;
}

/// Pushes every piece whose handle disagrees with the model. Returns how many
/// handles were touched.
pub fn sync_view<V: PieceView + ?Sized>(pieces: &[Piece], view: &mut V) -> usize {
    let mut touched = 0;
    for piece in pieces {
        if view.read_transform(piece.id) == Some(piece.current) {
            continue;
        }
        view.set_transform(piece.id, piece.current, piece.placed);
        touched += 1;
    }
    touched
}
