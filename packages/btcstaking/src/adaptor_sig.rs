use crate::error::Error;
use crate::Result;

use bitcoin::XOnlyPublicKey;
use k256::elliptic_curve::group::prime::PrimeCurveAffine;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{
    elliptic_curve::{
        ops::{MulByGenerator, Reduce},
        point::{AffineCoordinates, DecompressPoint},
        PrimeField,
    },
    AffinePoint, ProjectivePoint, Scalar, U256,
};
use sha2::{Digest, Sha256};

/// MODNSCALAR_SIZE is the size of a scalar on the secp256k1 curve
const MODNSCALAR_SIZE: usize = 32;

/// JACOBIAN_POINT_SIZE is the size of a point on the secp256k1 curve in
/// compressed form
const JACOBIAN_POINT_SIZE: usize = 33;

/// ADAPTOR_SIGNATURE_SIZE is the size of a Schnorr adaptor signature
/// It is in the form of (R, s, needsNegation) where `R` is a point,
/// `s` is a scalar, and `needsNegation` is a boolean value
pub const ADAPTOR_SIGNATURE_SIZE: usize = JACOBIAN_POINT_SIZE + MODNSCALAR_SIZE + 1;

const CHALLENGE_TAG: &[u8] = b"BIP0340/challenge";

const NONCE_TAG: &[u8] = b"babylon/adaptor-sig/nonce";

/// MAX_NONCE_ATTEMPTS bounds the nonce derivation loop; hitting a zero nonce
/// or an identity R is negligible, so this is never reached in practice
const MAX_NONCE_ATTEMPTS: u32 = 16;

// Adapted from https://github.com/RustCrypto/elliptic-curves/blob/520f67d26be1773bd600d05796cc26d797dd7182/k256/src/schnorr.rs#L181-L187
fn tagged_hash(tag: &[u8]) -> Sha256 {
    let tag_hash = Sha256::digest(tag);
    let mut digest = Sha256::new();
    // The hash is in sha256d, so we need to hash twice
    digest.update(tag_hash);
    digest.update(tag_hash);
    digest
}

/// bytes_to_point lifts a 32-byte x coordinate to the curve point with even y
pub fn bytes_to_point(bytes: &[u8]) -> Result<ProjectivePoint> {
    if bytes.len() != MODNSCALAR_SIZE {
        return Err(Error::DecompressPointFailed {});
    }
    let r_option = AffinePoint::decompress(
        k256::FieldBytes::from_slice(bytes),
        k256::elliptic_curve::subtle::Choice::from(false as u8),
    );
    let r: AffinePoint = Option::from(r_option).ok_or(Error::DecompressPointFailed {})?;
    // Convert AffinePoint to ProjectivePoint
    Ok(ProjectivePoint::from(r))
}

/// challenge computes e = tagged_hash("BIP0340/challenge", bytes(R) || bytes(P) || m) mod n
fn challenge(r: &ProjectivePoint, p_bytes: &[u8], msg: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(
        &tagged_hash(CHALLENGE_TAG)
            .chain_update(r.to_affine().x())
            .chain_update(p_bytes)
            .chain_update(msg)
            .finalize(),
    )
}

/// normalize_secret returns the secret scalar whose public point has even y,
/// together with that point
fn normalize_secret(sk: &k256::SecretKey) -> (Scalar, ProjectivePoint) {
    let x = *sk.to_nonzero_scalar();
    let p = ProjectivePoint::mul_by_generator(&x);
    if p.to_affine().y_is_odd().into() {
        (-x, -p)
    } else {
        (x, p)
    }
}

/// EncryptionKey is the public key `T` an adaptor signature is encrypted
/// under. For Babylon it is the BIP-340 public key of a finality provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncryptionKey {
    point: ProjectivePoint,
}

impl EncryptionKey {
    pub fn from_btc_pk(pk: &XOnlyPublicKey) -> Result<Self> {
        let point = bytes_to_point(&pk.serialize())?;
        Ok(EncryptionKey { point })
    }

    fn to_compressed_bytes(self) -> Vec<u8> {
        self.point.to_affine().to_encoded_point(true).as_bytes().to_vec()
    }
}

/// DecryptionKey is the secret `t` of an encryption key, i.e., the finality
/// provider's BTC secret key
#[derive(Clone)]
pub struct DecryptionKey {
    scalar: Scalar,
    point: ProjectivePoint,
}

impl DecryptionKey {
    pub fn from_secret_key(sk: &k256::SecretKey) -> Self {
        let (scalar, point) = normalize_secret(sk);
        DecryptionKey { scalar, point }
    }

    pub fn encryption_key(&self) -> EncryptionKey {
        EncryptionKey { point: self.point }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdaptorSignature {
    r: ProjectivePoint,
    s_hat: Scalar,
    needs_negation: bool,
}

impl AdaptorSignature {
    pub fn verify(&self, pub_key: &XOnlyPublicKey, enc_key: &EncryptionKey, msg: [u8; 32]) -> Result<()> {
        // Convert public key to point
        let p_bytes = pub_key.serialize();
        let p = bytes_to_point(&p_bytes)?;
        let t = enc_key.point;

        // Calculate R' = R - T (or R + T if negation is needed)
        let r_hat = if self.needs_negation {
            self.r + t
        } else {
            self.r - t
        };
        // Convert R' to affine coordinates
        let r_hat = r_hat.to_affine();

        let e = challenge(&self.r, &p_bytes, &msg);

        // Calculate expected R' = s'*G - e*P
        let s_hat_g = ProjectivePoint::mul_by_generator(&self.s_hat);
        let e_p = p * e;
        let expected_r_hat = s_hat_g - e_p;

        // Convert expected R' to affine coordinates
        let expected_r_hat = expected_r_hat.to_affine();

        // Ensure expected R' is not the point at infinity
        if expected_r_hat.is_identity().into() {
            return Err(Error::PointAtInfinity("expected R'".to_string()));
        }

        // Ensure R.y is even
        if self.r.to_affine().y_is_odd().into() {
            return Err(Error::PointWithOddY("R".to_string()));
        }

        // Ensure R' == expected R'
        if !r_hat.eq(&expected_r_hat) {
            return Err(Error::VerifyAdaptorSigFailed {});
        }

        Ok(())
    }

    pub fn new(asig_bytes: &[u8]) -> Result<Self> {
        if asig_bytes.len() != ADAPTOR_SIGNATURE_SIZE {
            return Err(Error::MalformedAdaptorSignature(
                ADAPTOR_SIGNATURE_SIZE,
                asig_bytes.len(),
            ));
        }
        // get R
        if asig_bytes[0] != 0x02 && asig_bytes[0] != 0x03 {
            return Err(Error::InvalidAdaptorSignatureFirstByte(asig_bytes[0]));
        }
        let is_y_odd = asig_bytes[0] == 0x03;
        let r_option = AffinePoint::decompress(
            k256::FieldBytes::from_slice(&asig_bytes[1..JACOBIAN_POINT_SIZE]),
            k256::elliptic_curve::subtle::Choice::from(is_y_odd as u8),
        );
        let r: AffinePoint = Option::from(r_option).ok_or(Error::DecompressPointFailed {})?;

        // get s_hat
        let s_hat_bytes = &asig_bytes[JACOBIAN_POINT_SIZE..JACOBIAN_POINT_SIZE + MODNSCALAR_SIZE];
        let s_hat_field_bytes = *k256::FieldBytes::from_slice(s_hat_bytes);
        let s_hat =
            Scalar::from_repr_vartime(s_hat_field_bytes).ok_or(Error::FailedToParseScalar {})?;

        let needs_negation = asig_bytes[JACOBIAN_POINT_SIZE + MODNSCALAR_SIZE] == 0x01;
        Ok(AdaptorSignature {
            r: r.into(),
            s_hat,
            needs_negation,
        })
    }

    /// to_bytes serializes the adaptor signature as R (compressed) || s' || needsNegation
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ADAPTOR_SIGNATURE_SIZE);
        bytes.extend_from_slice(self.r.to_affine().to_encoded_point(true).as_bytes());
        bytes.extend_from_slice(&self.s_hat.to_bytes());
        bytes.push(self.needs_negation as u8);
        bytes
    }

    /// decrypt turns the adaptor signature into a plain BIP-340 signature with
    /// the secret of the encryption key it was created with
    pub fn decrypt(&self, dk: &DecryptionKey) -> Result<k256::schnorr::Signature> {
        let s = if self.needs_negation {
            self.s_hat - dk.scalar
        } else {
            self.s_hat + dk.scalar
        };

        let mut sig_bytes = Vec::with_capacity(2 * MODNSCALAR_SIZE);
        sig_bytes.extend_from_slice(&self.r.to_affine().x());
        sig_bytes.extend_from_slice(&s.to_bytes());
        k256::schnorr::Signature::try_from(sig_bytes.as_slice())
            .map_err(|e| Error::InvalidSchnorrSignature(e.to_string()))
    }
}

fn derive_nonce(d: &Scalar, enc_key: &EncryptionKey, msg: &[u8; 32], counter: u32) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(
        &tagged_hash(NONCE_TAG)
            .chain_update(d.to_bytes())
            .chain_update(enc_key.to_compressed_bytes())
            .chain_update(msg)
            .chain_update(counter.to_be_bytes())
            .finalize(),
    )
}

/// enc_sign creates a Schnorr adaptor signature over the 32-byte message,
/// encrypted under the given encryption key
///
/// The nonce is derived deterministically from the secret key, the encryption
/// key and the message.
pub fn enc_sign(sk: &k256::SecretKey, enc_key: &EncryptionKey, msg: [u8; 32]) -> Result<AdaptorSignature> {
    // d = d' if has_even_y(P), otherwise n - d'
    let (d, p) = normalize_secret(sk);
    let p_bytes = p.to_affine().x();

    for counter in 0..MAX_NONCE_ATTEMPTS {
        let mut k = derive_nonce(&d, enc_key, &msg, counter);
        if k.is_zero().into() {
            continue;
        }

        // R = k*G + T
        let mut r = ProjectivePoint::mul_by_generator(&k) + enc_key.point;
        let r_affine = r.to_affine();
        if r_affine.is_identity().into() {
            continue;
        }

        // negate k and R if R.y is odd
        let needs_negation: bool = r_affine.y_is_odd().into();
        if needs_negation {
            k = -k;
            r = -r;
        }

        // s' = k + e*d mod n
        let e = challenge(&r, &p_bytes, &msg);
        let s_hat = k + e * d;

        return Ok(AdaptorSignature {
            r,
            s_hat,
            needs_negation,
        });
    }

    Err(Error::NonceGenerationFailed {})
}
