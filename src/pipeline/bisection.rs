/*
Copyright 2021 Jakub Lewandowski

This file is part of Climate Model Post-Processor (climpp).

Climate Model Post-Processor (climpp) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

Climate Model Post-Processor (climpp) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with Climate Model Post-Processor (climpp). If not, see https://www.gnu.org/licenses/.
*/

//! Module containing methods for conducting
//! binary search (bisection) of elements closest
//! to searched values in monotonic datasets.

use crate::errors::SearchError;

/// Core bisection function, simply an implementation
/// of binary search algorithm adapted to searching values
/// in-between the set items of ascending or descending array.
fn binary_search<T: PartialOrd>(array: &[T], x: &T) -> Result<usize, SearchError> {
    let (first, last) = match (array.first(), array.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(SearchError::EmptyArray),
    };

    if x < first && x < last || x > first && x > last {
        return Err(SearchError::OutOfBounds);
    }

    let mut lo = 0;
    let mut hi = array.len() - 1;

    // if the array is sorted descendingly we use a function with reversed signs
    if first < last {
        while lo < hi {
            let mid = (lo + hi) / 2;

            if array[mid] >= *x {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
    } else {
        while lo < hi {
            let mid = (lo + hi) / 2;

            if array[mid] <= *x {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
    }

    Ok(lo)
}

/// Convenience method to find the index of the closest item
/// to the left of the searched value.
pub fn find_left_closest<T: PartialOrd>(array: &[T], x: &T) -> Result<usize, SearchError> {
    let found_index = binary_search(array, x)?;
    let ascending = array[0] < array[array.len() - 1];

    let exact_or_past = if ascending {
        array[found_index] <= *x
    } else {
        array[found_index] >= *x
    };

    if exact_or_past || found_index == 0 {
        Ok(found_index)
    } else {
        Ok(found_index - 1)
    }
}

/// Index `i` of the segment `array[i]..=array[i + 1]` containing `x`.
///
/// A value equal to the last item falls into the last segment.
pub fn find_bracket<T: PartialOrd>(array: &[T], x: &T) -> Result<usize, SearchError> {
    if array.len() < 2 {
        return Err(if array.is_empty() {
            SearchError::EmptyArray
        } else {
            SearchError::TooShort
        });
    }

    let left = find_left_closest(array, x)?;
    Ok(left.min(array.len() - 2))
}

#[cfg(test)]
mod tests {
    use super::{find_bracket, find_left_closest};
    use crate::errors::SearchError;

    #[test]
    fn ascending() {
        let array = [0.0, 1.0, 2.0, 5.0];

        assert_eq!(find_left_closest(&array, &1.5).unwrap(), 1);
        assert_eq!(find_left_closest(&array, &2.0).unwrap(), 2);
        assert_eq!(find_left_closest(&array, &0.0).unwrap(), 0);
        assert_eq!(find_bracket(&array, &5.0).unwrap(), 2);
    }

    #[test]
    fn descending() {
        let array = [1.0, 0.5, 0.25, 0.0];

        assert_eq!(find_left_closest(&array, &0.4).unwrap(), 1);
        assert_eq!(find_bracket(&array, &0.0).unwrap(), 2);
    }

    #[test]
    fn out_of_bounds() {
        let array = [0.0, 1.0];

        assert!(matches!(
            find_left_closest(&array, &2.0),
            Err(SearchError::OutOfBounds)
        ));
        assert!(matches!(
            find_bracket::<f64>(&[], &2.0),
            Err(SearchError::EmptyArray)
        ));
        assert!(matches!(
            find_bracket(&[1.0], &1.0),
            Err(SearchError::TooShort)
        ));
    }
}
