use std::{
    alloc::{GlobalAlloc, Layout, System},
    ptr::NonNull,
};

use crate::{dictionary::UserVar, host::Host, word::Cell, Error, Forth};

// Helper type that will un-leak the buffer once it is dropped.
pub struct LeakBox<T> {
    ptr: NonNull<T>,
    len: usize,
}

impl<T: Copy + Default> LeakBox<T> {
    /// Allocates `len` default-initialized items.
    pub fn new(len: usize) -> Result<Self, Error> {
        if len == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                len,
            });
        }
        let layout = Layout::array::<T>(len).map_err(|_| Error::OutsideMem)?;
        let raw = unsafe { System.alloc(layout) }.cast::<T>();
        let ptr = match NonNull::new(raw) {
            Some(p) => p,
            None => std::alloc::handle_alloc_error(layout),
        };
        for i in 0..len {
            unsafe { ptr.as_ptr().add(i).write(T::default()) };
        }
        Ok(Self { ptr, len })
    }

    /// # Safety
    ///
    /// The returned slice must be the only reference to this buffer, and
    /// must not be used after the `LeakBox` is dropped.
    unsafe fn leak_slice(&self) -> &'static mut [T] {
        core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.len
    }
}

impl<T> Drop for LeakBox<T> {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        if let Ok(layout) = Layout::array::<T>(self.len) {
            unsafe { System.dealloc(self.ptr.as_ptr().cast(), layout) }
        }
    }
}

/// Sizes for an [`LBForth`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LBForthParams {
    #[cfg_attr(
        feature = "serde",
        serde(default = "LBForthParams::default_data_stack_elems")
    )]
    pub data_stack_elems: usize,
    #[cfg_attr(
        feature = "serde",
        serde(default = "LBForthParams::default_return_stack_elems")
    )]
    pub return_stack_elems: usize,
    #[cfg_attr(
        feature = "serde",
        serde(default = "LBForthParams::default_dict_buf_elems")
    )]
    pub dict_buf_elems: usize,
    #[cfg_attr(feature = "serde", serde(default))]
    pub trace: bool,
}

impl LBForthParams {
    pub const fn new() -> Self {
        Self {
            data_stack_elems: Self::default_data_stack_elems(),
            return_stack_elems: Self::default_return_stack_elems(),
            dict_buf_elems: Self::default_dict_buf_elems(),
            trace: false,
        }
    }

    const fn default_data_stack_elems() -> usize {
        32
    }

    const fn default_return_stack_elems() -> usize {
        32
    }

    const fn default_dict_buf_elems() -> usize {
        4096
    }
}

impl Default for LBForthParams {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`Forth`] that owns its buffers.
pub struct LBForth<H: 'static> {
    // declared first so it is dropped before the buffers it borrows
    pub forth: Forth<'static, H>,
    _payload_dstack: LeakBox<Cell>,
    _payload_rstack: LeakBox<Cell>,
    _dict_buf: LeakBox<u8>,
}

impl<H: Host + 'static> LBForth<H> {
    /// Allocates the buffers and bootstraps the primitives.
    pub fn from_params(params: LBForthParams, host_ctxt: H) -> Result<Self, Error> {
        let mut lbf = Self::alloc(&params, host_ctxt)?;
        lbf.forth.init(params.trace);
        lbf.forth.bootstrap()?;
        Ok(lbf)
    }

    /// Allocates the buffers and restores a saved dictionary image instead
    /// of bootstrapping.
    pub fn from_image(params: LBForthParams, host_ctxt: H, image: &[u8]) -> Result<Self, Error> {
        let mut lbf = Self::alloc(&params, host_ctxt)?;
        lbf.forth.load_image(image)?;
        let trace = Cell::from(params.trace);
        lbf.forth.uservar_set(UserVar::Trace.id(), trace)?;
        Ok(lbf)
    }

    fn alloc(params: &LBForthParams, host_ctxt: H) -> Result<Self, Error> {
        let _payload_dstack: LeakBox<Cell> = LeakBox::new(params.data_stack_elems)?;
        let _payload_rstack: LeakBox<Cell> = LeakBox::new(params.return_stack_elems)?;
        let _dict_buf: LeakBox<u8> = LeakBox::new(params.dict_buf_elems)?;

        let forth = unsafe {
            Forth::new(
                _dict_buf.leak_slice(),
                _payload_dstack.leak_slice(),
                _payload_rstack.leak_slice(),
                host_ctxt,
            )?
        };

        Ok(Self {
            forth,
            _payload_dstack,
            _payload_rstack,
            _dict_buf,
        })
    }
}

#[cfg(test)]
pub mod test {
    use super::{LBForth, LBForthParams, LeakBox};
    use crate::{testutil::TestHost, Error};

    #[test]
    fn leakbox() {
        let lb = LeakBox::<i32>::new(8).unwrap();
        assert_eq!(lb.len(), 8);
        let empty = LeakBox::<u8>::new(0).unwrap();
        assert_eq!(empty.len(), 0);
    }

    #[test]
    fn params() {
        let params = LBForthParams::default();
        assert_eq!(params.data_stack_elems, 32);
        assert_eq!(params.return_stack_elems, 32);
        assert_eq!(params.dict_buf_elems, 4096);
        assert!(!params.trace);
    }

    #[test]
    fn too_small() {
        let params = LBForthParams {
            dict_buf_elems: 16,
            ..LBForthParams::default()
        };
        assert!(matches!(
            LBForth::from_params(params, TestHost::default()),
            Err(Error::OutsideMem)
        ));

        // room for the user variables but not for the primitives
        let params = LBForthParams {
            dict_buf_elems: 64,
            ..LBForthParams::default()
        };
        assert!(matches!(
            LBForth::from_params(params, TestHost::default()),
            Err(Error::OutsideMem)
        ));
    }

    #[test]
    fn image_keeps_definitions() {
        let params = LBForthParams::default();
        let mut lbf = LBForth::from_params(params, TestHost::default()).unwrap();
        lbf.forth.eval(": five 5 ;").unwrap();
        let image = lbf.forth.dict_image().unwrap().to_vec();

        let params = LBForthParams {
            trace: true,
            ..LBForthParams::default()
        };
        let mut restored = LBForth::from_image(params, TestHost::default(), &image).unwrap();
        assert_eq!(restored.forth.uservar_get(2), Ok(1));
        restored.forth.eval("five five +").unwrap();
        assert_eq!(restored.forth.pop(), Ok(10));

        let small = LBForthParams {
            dict_buf_elems: image.len() - 1,
            ..LBForthParams::default()
        };
        assert!(matches!(
            LBForth::from_image(small, TestHost::default(), &image),
            Err(Error::OutsideMem)
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn params_deserialize_with_defaults() {
        // serde is only a dependency; round trip through serde's own value types
        use serde::de::{value::MapDeserializer, IntoDeserializer};
        let fields = [("dict_buf_elems", 512usize)];
        let entries = fields.map(|(k, v)| (k, v.into_deserializer()));
        let de: MapDeserializer<'_, _, serde::de::value::Error> =
            MapDeserializer::new(entries.into_iter());
        let params: LBForthParams = serde::Deserialize::deserialize(de).unwrap();
        assert_eq!(params.dict_buf_elems, 512);
        assert_eq!(params.data_stack_elems, 32);
        assert!(!params.trace);
    }
}
