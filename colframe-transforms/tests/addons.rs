//! End-to-end tests of the transform helpers over array-backed dataframes

use colframe_core::{ElementType, Result, Tensor, Value};
use colframe_readers::{from_iter, from_values};
use colframe_transforms::{batching, copy_scalar, one_hot, sequence_mask, truncate, OneHotOptions};

const LABELS: [i64; 8] = [2, 3, 4, 5, 6, 7, 8, 9];

fn one_hot_rows(labels: &[i64]) -> Vec<f32> {
    let mut data = vec![0.0; labels.len() * 10];
    for (i, &label) in labels.iter().enumerate() {
        data[i * 10 + label as usize] = 1.0;
    }
    data
}

#[test]
fn one_hot_from_labels() {
    let frame = from_iter(LABELS);
    let encoded = one_hot(&frame, 0, OneHotOptions::with_depth(10)).unwrap();

    let rows: Vec<_> = frame.iter(&[encoded]).unwrap().collect::<Result<_>>().unwrap();
    assert_eq!(rows.len(), 8);
    for (row, &label) in rows.iter().zip(LABELS.iter()) {
        let tensor = row[0].expect_tensor().unwrap();
        assert_eq!(tensor.as_slice::<f32>(), Some(one_hot_rows(&[label]).as_slice()));
    }
}

#[test]
fn one_hot_options_from_json() {
    let options: OneHotOptions =
        serde_json::from_str(r#"{ "depth": 4, "element_type": "I32" }"#).unwrap();
    assert_eq!(options.depth, 4);
    assert_eq!(options.on_value, 1.0);

    let frame = from_iter([1i64]);
    let encoded = one_hot(&frame, 0, options).unwrap();
    let row = frame.iter(&[encoded]).unwrap().next().unwrap().unwrap();
    assert_eq!(row[0].expect_tensor().unwrap().as_slice::<i32>(), Some(&[0, 1, 0, 0][..]));
}

#[test]
fn scalar_tensor_from_ints() {
    let frame = from_iter(LABELS);
    let scalar = copy_scalar(&frame, 0, ElementType::F32).unwrap();

    let values: Vec<f32> = frame
        .iter(&[scalar])
        .unwrap()
        .map(|row| {
            let row = row.unwrap();
            let tensor = row[0].expect_tensor().unwrap();
            assert_eq!(tensor.shape(), &[1]);
            tensor.as_slice::<f32>().unwrap()[0]
        })
        .collect();
    assert_eq!(values, LABELS.iter().map(|&v| v as f32).collect::<Vec<_>>());
}

#[test]
fn batching_one_hot_tensors() {
    let frame = from_iter(LABELS);
    let encoded = one_hot(&frame, 0, OneHotOptions::with_depth(10)).unwrap();
    let batched = batching(&frame, &[encoded], 3, 2).unwrap();
    assert_eq!(batched.row_count(), 2);

    let mut cursor = batched.iter(&[0]).unwrap();
    let first = cursor.next_row().unwrap().unwrap();
    let groups = first[0].as_tuple().unwrap();
    assert_eq!(groups.len(), 2);
    for (g, group) in groups.iter().enumerate() {
        let tensor = group.expect_tensor().unwrap();
        assert_eq!(tensor.shape(), &[3, 10]);
        assert_eq!(
            tensor.as_slice::<f32>(),
            Some(one_hot_rows(&LABELS[g * 3..g * 3 + 3]).as_slice())
        );
    }

    // Two rows are left for the last window: one short group, no second.
    let last = cursor.next_row().unwrap().unwrap();
    let groups = last[0].as_tuple().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].expect_tensor().unwrap().shape(), &[2, 10]);
    assert!(cursor.next_row().unwrap().is_none());
}

#[test]
fn sequence_mask_from_lengths() {
    let lengths = Tensor::from_vec(vec![2i32, 3], vec![2]).unwrap();
    let frame = from_values(vec![Value::from(lengths)]);
    let fixed = sequence_mask(&frame, 0, false, 4).unwrap();
    let variable = sequence_mask(&frame, 0, true, 4).unwrap();

    let row = frame.iter(&[fixed, variable]).unwrap().next().unwrap().unwrap();
    assert_eq!(row[0].expect_tensor().unwrap().shape(), &[2, 4, 4]);
    assert_eq!(row[1].expect_tensor().unwrap().shape(), &[2, 3, 3]);
    assert!(sequence_mask(&frame, 0, false, 0).is_err());
}

#[test]
fn truncate_a_sequence_pair() {
    let input = Tensor::from_vec((1..=8).map(|v| v as f32).collect(), vec![2, 4]).unwrap();
    let lengths = Tensor::from_vec(vec![2i32, 3], vec![2]).unwrap();
    let frame = from_values(vec![Value::tuple(vec![Value::from(input), Value::from(lengths)])]);

    let input_column = frame.register_extract(0, 0).unwrap();
    let lengths_column = frame.register_extract(0, 1).unwrap();
    let truncated = truncate(&frame, input_column, lengths_column).unwrap();

    let row = frame.iter(&[truncated]).unwrap().next().unwrap().unwrap();
    let tensor = row[0].expect_tensor().unwrap();
    assert_eq!(tensor.shape(), &[2, 3]);
    assert_eq!(tensor.as_slice::<f32>(), Some(&[1.0, 2.0, 3.0, 5.0, 6.0, 7.0][..]));
}

#[test]
fn shuffled_batches_keep_their_members() {
    let frame = from_iter(LABELS);
    frame.shuffle(42);
    let scalar = copy_scalar(&frame, 0, ElementType::I32).unwrap();
    let batched = batching(&frame, &[scalar], 4, 1).unwrap();

    let mut seen: Vec<i32> = batched
        .iter(&[0])
        .unwrap()
        .flat_map(|row| {
            let row = row.unwrap();
            let tensor = row[0].as_tuple().unwrap()[0].expect_tensor().unwrap().clone();
            tensor.as_slice::<i32>().unwrap().to_vec()
        })
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, (2..=9).collect::<Vec<_>>());
}
