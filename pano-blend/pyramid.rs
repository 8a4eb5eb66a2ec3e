//! Gaussian and Laplacian pyramids over `f32` image planes.
//!
//! Downsampling applies the binomial kernel (1 4 6 4 1)/16 with reflect-101
//! borders and keeps every second sample, giving ⌈w/2⌉×⌈h/2⌉. Upsampling
//! interpolates to an explicit target size so odd dimensions round-trip.

use image::{ImageBuffer, Pixel};

/// Float image plane with any pixel layout
pub type Plane<P> = ImageBuffer<P, Vec<f32>>;

const KERNEL: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

/// Source indices and weights for one output sample; unused slots weigh 0
type Taps = [(usize, f32); 5];

/// Reflect-101 border handling: `-1 → 1`, `n → n-2`
fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let period = 2 * (n - 1);
    let i = i.rem_euclid(period);
    (if i >= n { period - i } else { i }) as usize
}

fn down_taps(n: usize) -> Vec<Taps> {
    (0..n.div_ceil(2))
        .map(|o| {
            let centre = 2 * o as isize;
            let mut taps = [(0, 0.0); 5];
            for (k, tap) in taps.iter_mut().enumerate() {
                *tap = (reflect101(centre + k as isize - 2, n), KERNEL[k]);
            }
            taps
        })
        .collect()
}

fn up_taps(n: usize, target: usize) -> Vec<Taps> {
    (0..target)
        .map(|x| {
            let i = (x / 2) as isize;
            let mut taps = [(0, 0.0); 5];
            if x % 2 == 0 {
                taps[0] = (reflect101(i - 1, n), 1.0 / 8.0);
                taps[1] = (reflect101(i, n), 6.0 / 8.0);
                taps[2] = (reflect101(i + 1, n), 1.0 / 8.0);
            } else {
                taps[0] = (reflect101(i, n), 0.5);
                taps[1] = (reflect101(i + 1, n), 0.5);
            }
            taps
        })
        .collect()
}

/// Separable resampling: rows through `taps_x`, then columns through `taps_y`
fn resample<P>(img: &Plane<P>, taps_x: &[Taps], taps_y: &[Taps]) -> Plane<P>
where
    P: Pixel<Subpixel = f32>,
{
    let c = P::CHANNEL_COUNT as usize;
    let (w, h) = (img.width() as usize, img.height() as usize);
    let (ow, oh) = (taps_x.len(), taps_y.len());
    let src: &[f32] = img.as_raw();

    let mut tmp = vec![0.0f32; ow * h * c];
    for y in 0..h {
        let row = &src[y * w * c..(y + 1) * w * c];
        let out_row = &mut tmp[y * ow * c..(y + 1) * ow * c];
        for (ox, taps) in taps_x.iter().enumerate() {
            for &(sx, wgt) in taps {
                for ch in 0..c {
                    out_row[ox * c + ch] += wgt * row[sx * c + ch];
                }
            }
        }
    }

    let mut out = Plane::<P>::new(ow as u32, oh as u32);
    let dst: &mut [f32] = &mut out;
    let stride = ow * c;
    for (oy, taps) in taps_y.iter().enumerate() {
        let out_row = &mut dst[oy * stride..(oy + 1) * stride];
        for &(sy, wgt) in taps {
            let src_row = &tmp[sy * stride..(sy + 1) * stride];
            for (o, s) in out_row.iter_mut().zip(src_row) {
                *o += wgt * s;
            }
        }
    }
    out
}

/// Blur and halve
pub fn down<P>(img: &Plane<P>) -> Plane<P>
where
    P: Pixel<Subpixel = f32>,
{
    resample(img, &down_taps(img.width() as usize), &down_taps(img.height() as usize))
}

/// Interpolate up to exactly `width`×`height`
pub fn up<P>(img: &Plane<P>, width: u32, height: u32) -> Plane<P>
where
    P: Pixel<Subpixel = f32>,
{
    resample(
        img,
        &up_taps(img.width() as usize, width as usize),
        &up_taps(img.height() as usize, height as usize),
    )
}

/// Level 0 is `img` itself; each further level is `down` of the previous
pub fn gaussian<P>(img: &Plane<P>, levels: usize) -> Vec<Plane<P>>
where
    P: Pixel<Subpixel = f32>,
{
    let mut pyramid = Vec::with_capacity(levels.max(1));
    let mut current = img.clone();
    for _ in 1..levels {
        let next = down(&current);
        pyramid.push(std::mem::replace(&mut current, next));
    }
    pyramid.push(current);
    pyramid
}

/// Band-pass residuals `G[i] - up(G[i+1])`, with the coarsest Gaussian level last
pub fn laplacian<P>(img: &Plane<P>, levels: usize) -> Vec<Plane<P>>
where
    P: Pixel<Subpixel = f32>,
{
    let gauss = gaussian(img, levels);
    let mut pyramid = Vec::with_capacity(gauss.len());
    for pair in gauss.windows(2) {
        let (fine, coarse) = (&pair[0], &pair[1]);
        let mut residual = fine.clone();
        let expanded = up(coarse, fine.width(), fine.height());
        for (r, e) in residual.iter_mut().zip(expanded.iter()) {
            *r -= e;
        }
        pyramid.push(residual);
    }
    if let Some(coarsest) = gauss.into_iter().last() {
        pyramid.push(coarsest);
    }
    pyramid
}

/// Collapse a Laplacian pyramid, coarsest level last. `None` for an empty pyramid.
pub fn reconstruct<P>(pyramid: Vec<Plane<P>>) -> Option<Plane<P>>
where
    P: Pixel<Subpixel = f32>,
{
    let mut levels = pyramid.into_iter().rev();
    let mut current = levels.next()?;
    for residual in levels {
        let mut expanded = up(&current, residual.width(), residual.height());
        for (e, r) in expanded.iter_mut().zip(residual.iter()) {
            *e += r;
        }
        current = expanded;
    }
    Some(current)
}
