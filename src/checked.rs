// Modified from https://github.com/zeta12ti/Checked/blob/master/src/num.rs
// Original license:
// MIT License
//
// Copyright (c) 2017 zeta12ti
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::ops::Add;

/// An integer whose arithmetic saturates into an "overflowed" state instead of panicking or
/// wrapping. Byte accounting for batches and commands goes through this type.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub(crate) struct Checked<T>(pub(crate) Option<T>);

impl<T> Checked<T> {
    #[inline]
    pub(crate) fn new(x: T) -> Checked<T> {
        Checked(Some(x))
    }

    pub(crate) fn get(self) -> crate::error::Result<T> {
        self.0
            .ok_or_else(|| crate::error::Error::invalid_argument("checked arithmetic failure"))
    }
}

impl Add<usize> for Checked<usize> {
    type Output = Checked<usize>;

    #[inline]
    fn add(self, other: usize) -> Checked<usize> {
        Checked(self.0.and_then(|x| x.checked_add(other)))
    }
}
